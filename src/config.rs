use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{BenchError, Result};

/// Main configuration structure loaded from reason_bench.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub evaluation: EvaluationConfig,
    pub cache: CacheConfig,
    pub tracker: TrackerConfig,
}

/// Completion endpoint settings, mirroring the request body we send
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(default)]
    pub min_p: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    /// Per-call HTTP timeout. Retries bound total failure time, this bounds
    /// a single hung connection.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base backoff unit; attempts sleep base*2, base*4, ... between tries.
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

/// Embedding provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Evaluation thresholds and longitudinal-analysis knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationConfig {
    /// Pairs below this similarity are reported as significant differences
    pub similarity_threshold: f32,
    /// Rolling window of past responses kept for comparison
    pub history_window: usize,
    /// Minimum cluster membership before a topic is considered real
    pub min_topic_size: usize,
    /// Readiness thresholds keyed by metric name; required, fail fast if absent
    pub readiness_thresholds: HashMap<String, f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_results_path() -> PathBuf {
    PathBuf::from("data/benchmark_results.jsonl")
}

impl Default for Config {
    fn default() -> Self {
        let mut readiness_thresholds = HashMap::new();
        readiness_thresholds.insert("min_total_score".to_string(), 6.0);
        readiness_thresholds.insert("min_coherence".to_string(), 0.6);
        Self {
            llm: LlmConfig {
                model: "qwen2.5-7b-instruct-1m".to_string(),
                api_url: "http://localhost:1234/v1/completions".to_string(),
                max_tokens: 4000,
                temperature: 0.5,
                top_p: 0.85,
                top_k: 50,
                min_p: Some(0.2),
                presence_penalty: Some(1.0),
                timeout_ms: default_timeout_ms(),
                retries: default_retries(),
                backoff_base_ms: default_backoff_ms(),
            },
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                model: "deterministic".to_string(),
                dimensions: 384,
                retries: default_retries(),
                api_url: None,
            },
            evaluation: EvaluationConfig {
                similarity_threshold: 0.75,
                history_window: 10,
                min_topic_size: 2,
                readiness_thresholds,
            },
            cache: CacheConfig {
                dir: None,
                capacity: default_cache_capacity(),
            },
            tracker: TrackerConfig {
                results_path: default_results_path(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses REASON_BENCH_CONFIG or defaults to "reason_bench.toml".
    pub fn load() -> Result<Self> {
        if let Ok(env_path) = std::env::var("RB_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }

        let config_path = std::env::var("REASON_BENCH_CONFIG")
            .unwrap_or_else(|_| "reason_bench.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content).map_err(|e| BenchError::Config {
                message: format!("failed to parse {}: {}", config_path, e),
            })?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        // Env overrides (env-first)
        if let Ok(model) = std::env::var("RB_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(url) = std::env::var("RB_LLM_API_URL") {
            config.llm.api_url = url;
        }
        if let Some(max_tokens) = std::env::var("RB_LLM_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temp) = std::env::var("RB_LLM_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
        {
            config.llm.temperature = temp;
        }
        if let Some(retries) = std::env::var("RB_LLM_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|&n| n > 0 && n <= 5)
        {
            config.llm.retries = retries;
        }
        if let Ok(provider) = std::env::var("RB_EMBED_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Some(dim) = std::env::var("RB_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.embedding.dimensions = dim;
        }
        if let Ok(dir) = std::env::var("RB_CACHE_DIR") {
            config.cache.dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on malformed or missing required settings.
    pub fn validate(&self) -> Result<()> {
        if !self.llm.api_url.starts_with("http://") && !self.llm.api_url.starts_with("https://") {
            return Err(BenchError::Config {
                message: format!(
                    "llm.api_url '{}' must start with http:// or https://",
                    self.llm.api_url
                ),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(BenchError::Config {
                message: "llm.model must not be empty".to_string(),
            });
        }
        if self.evaluation.readiness_thresholds.is_empty() {
            return Err(BenchError::Config {
                message: "evaluation.readiness_thresholds must not be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.evaluation.similarity_threshold) {
            return Err(BenchError::Config {
                message: format!(
                    "evaluation.similarity_threshold {} out of [0, 1]",
                    self.evaluation.similarity_threshold
                ),
            });
        }
        if self.embedding.dimensions == 0 {
            return Err(BenchError::Config {
                message: "embedding.dimensions must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Directory for the on-disk response cache. Falls back to the platform
    /// cache dir, then to a relative path.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache.dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .map(|d| d.join("reason-bench").join("responses"))
            .unwrap_or_else(|| PathBuf::from(".reason-bench-cache"))
    }
}
