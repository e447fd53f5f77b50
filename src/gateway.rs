//! Retrying, caching client for the completion endpoint.
//!
//! The transport is a trait so tests can count calls and inject failures;
//! the production impl posts to an OpenAI-style /v1/completions endpoint.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{ResponseCache, cache_key};
use crate::config::{Config, LlmConfig};
use crate::error::{BenchError, Result};
use crate::prompts::{Technique, format_prompt};
use crate::sanitize::StructuredResponse;

/// One raw completion round-trip. Implementations must be cancel-safe; the
/// gateway owns retries, validation, and caching above this seam.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// HTTP POST to the configured completion endpoint. Proxies are bypassed:
/// the endpoint is expected to be local.
pub struct HttpTransport {
    client: reqwest::Client,
    llm: LlmConfig,
}

impl HttpTransport {
    pub fn new(llm: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(llm.timeout_ms))
            .no_proxy()
            .build()
            .map_err(|e| BenchError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, llm })
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.llm.model,
            "prompt": prompt,
            "max_tokens": self.llm.max_tokens,
            "temperature": self.llm.temperature,
            "top_p": self.llm.top_p,
            "top_k": self.llm.top_k,
            "stream": false,
        });
        if let Some(min_p) = self.llm.min_p {
            body["min_p"] = json!(min_p);
        }
        if let Some(presence_penalty) = self.llm.presence_penalty {
            body["presence_penalty"] = json!(presence_penalty);
        }
        body
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.llm.api_url)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BenchError::Transport {
                message: format!("completion endpoint error {}: {}", status, error_text),
            });
        }

        let body: Value = response.json().await.map_err(|e| BenchError::Transport {
            message: format!("failed to parse completion response: {}", e),
        })?;

        let text = body["choices"][0]["text"].as_str().ok_or_else(|| {
            BenchError::Transport {
                message: "completion response carried no choices[0].text".to_string(),
            }
        })?;

        Ok(text.trim().to_string())
    }
}

pub struct Gateway {
    transport: Arc<dyn CompletionTransport>,
    cache: ResponseCache,
    model: String,
    retries: u32,
    backoff_base: Duration,
}

impl Gateway {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.llm.clone())?);
        Self::with_transport(config, transport)
    }

    /// Constructor seam for tests: swap the transport, keep everything else.
    pub fn with_transport(
        config: &Config,
        transport: Arc<dyn CompletionTransport>,
    ) -> Result<Self> {
        let cache = ResponseCache::new(config.cache_dir(), config.cache.capacity)?;
        Ok(Self {
            transport,
            cache,
            model: config.llm.model.clone(),
            retries: config.llm.retries.max(1),
            backoff_base: Duration::from_millis(config.llm.backoff_base_ms),
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// One attempt: call the transport, clean, validate. Invalid structure
    /// fails the attempt so the retry loop issues a fresh query instead of
    /// returning a malformed result.
    async fn attempt(&self, prompt: &str) -> Result<StructuredResponse> {
        let raw = self.transport.complete(prompt).await?;
        let response = StructuredResponse::from_raw(&raw);
        if !response.is_valid() {
            return Err(BenchError::Structure {
                message: "cleaned response lacks mandatory sections".to_string(),
            });
        }
        Ok(response)
    }

    /// Query with cache-first lookup and bounded retry.
    ///
    /// Cache hits bypass validation; entries were valid when stored.
    /// Backoff between attempt n and n+1 is base * 2^n, so with the 1s
    /// default the waits are ~2s then ~4s.
    pub async fn query(
        &self,
        question: &str,
        technique: Technique,
    ) -> Result<StructuredResponse> {
        let key = cache_key(question, technique, &self.model);
        if let Some(hit) = self.cache.get(&key) {
            debug!("returning cached response for {key}");
            return Ok(hit);
        }

        let prompt = format_prompt(question, technique);
        let mut last_err = BenchError::Internal {
            message: "no attempt made".to_string(),
        };

        for attempt in 1..=self.retries {
            match self.attempt(&prompt).await {
                Ok(response) => {
                    if let Err(e) = self.cache.put(&key, &response) {
                        warn!("failed to store cache entry {key}: {e}");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        "attempt {}/{} failed for question {:?}: {}",
                        attempt,
                        self.retries,
                        question.chars().take(60).collect::<String>(),
                        e
                    );
                    let retryable = e.is_retryable();
                    last_err = e;
                    if !retryable {
                        break;
                    }
                    if attempt < self.retries {
                        let delay = self.backoff_base * 2u32.saturating_pow(attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_err)
    }

    /// Issue all queries concurrently. The output is positionally aligned
    /// with the input regardless of completion order, and one query's
    /// failure never aborts its siblings.
    pub async fn batch_query(
        &self,
        questions: &[String],
        technique: Technique,
    ) -> Vec<Result<StructuredResponse>> {
        let futures = questions
            .iter()
            .map(|question| self.query(question, technique));
        let results = futures_util::future::join_all(futures).await;
        info!(
            "batch_query finished: {}/{} succeeded",
            results.iter().filter(|r| r.is_ok()).count(),
            questions.len()
        );
        results
    }
}
