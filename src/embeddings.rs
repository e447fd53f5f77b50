use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts. Default implementation is sequential; remote
    /// providers may override with a single batched request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

// OpenAI-compatible embeddings endpoint (works against local servers too)
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_url: String,
    model: String,
    dims: usize,
    retries: u32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponseData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseData>,
}

impl HttpEmbedder {
    pub fn new(api_url: String, model: String, dims: usize, retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .no_proxy()
            .build()
            .context("Failed to build reqwest client with timeout")?;

        Ok(Self {
            client,
            api_url,
            model,
            dims,
            retries: retries.clamp(1, 5),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(
            "Generating embedding (model={}, chars={})",
            self.model,
            text.len()
        );

        let body = EmbedRequest {
            model: &self.model,
            input: text,
        };

        // Retry with simple exponential backoff
        let mut last_err: Option<anyhow::Error> = None;
        for i in 0..self.retries {
            let send_res = self
                .client
                .post(&self.api_url)
                .json(&body)
                .send()
                .await
                .context("Failed to send request to embeddings endpoint");
            let response = match send_res {
                Ok(resp) => resp,
                Err(e) => {
                    last_err = Some(e);
                    let delay_ms = 200u64 * (1u64 << i);
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                last_err = Some(anyhow::anyhow!(
                    "Embeddings endpoint error {}: {}",
                    status,
                    error_text
                ));
                let delay_ms = 200u64 * (1u64 << i);
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                continue;
            }

            let parse_res: Result<EmbedResponse> = response
                .json()
                .await
                .context("Failed to parse embeddings response");
            match parse_res {
                Ok(result) => {
                    return result
                        .data
                        .into_iter()
                        .next()
                        .map(|d| d.embedding)
                        .context("No embedding returned from endpoint");
                }
                Err(e) => {
                    last_err = Some(e);
                    let delay_ms = 200u64 * (1u64 << i);
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Unknown embedding error")))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

// Deterministic, local embedder for testing/offline use (no network)
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: Option<usize>) -> Self {
        let d = dims.unwrap_or(384).max(1);
        Self { dims: d }
    }

    // Produce a stable stream of pseudo-random f32 values in [-1.0, 1.0),
    // lightly biased by token overlap so that similar texts land closer
    // together than unrelated ones.
    fn generate(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let mut out = vec![0.0f32; self.dims];

        // Token-level contribution: each token adds a deterministic unit
        // direction, so shared vocabulary means higher cosine similarity.
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        for token in &tokens {
            let mut hasher = Sha256::new();
            hasher.update(b"token:");
            hasher.update(token.as_bytes());
            let digest = hasher.finalize();
            let mut idx = 0usize;
            for chunk in digest.chunks(4).cycle().take(self.dims.min(64)) {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(chunk);
                let val_u32 = u32::from_le_bytes(bytes);
                let v01 = (val_u32 as f32) / (u32::MAX as f32 + 1.0);
                // Spread each token over a digest-derived set of slots
                let slot = (val_u32 as usize).wrapping_add(idx * 31) % self.dims;
                out[slot] += v01 * 2.0 - 1.0;
                idx += 1;
            }
        }

        // Whole-text contribution keeps distinct texts apart even when
        // vocabulary fully overlaps.
        let mut i: u32 = 0;
        let mut filled = 0usize;
        while filled < self.dims {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(i.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if filled >= self.dims {
                    break;
                }
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(chunk);
                let val_u32 = u32::from_le_bytes(bytes);
                let v01 = (val_u32 as f32) / (u32::MAX as f32 + 1.0);
                out[filled] += (v01 * 2.0 - 1.0) * 0.1;
                filled += 1;
            }
            i = i.wrapping_add(1);
        }

        // Normalize to unit length to emulate real embeddings
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Factory: build the embedder named by the configuration.
/// "http" needs embedding.api_url; anything else falls back to the
/// deterministic hash embedder so offline runs still work.
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider.as_str() {
        "http" => {
            let api_url = config
                .embedding
                .api_url
                .clone()
                .context("embedding.provider=http requires embedding.api_url")?;
            info!(
                "Using HTTP embeddings (model={}, url={})",
                config.embedding.model, api_url
            );
            Ok(Arc::new(HttpEmbedder::new(
                api_url,
                config.embedding.model.clone(),
                config.embedding.dimensions,
                config.embedding.retries,
            )?))
        }
        other => {
            if other != "hash" {
                info!("Unknown embedding provider '{}', using hash embedder", other);
            } else {
                info!(
                    "Using HashEmbedder (deterministic) with {} dimensions",
                    config.embedding.dimensions
                );
            }
            Ok(Arc::new(HashEmbedder::new(Some(
                config.embedding.dimensions,
            ))))
        }
    }
}
