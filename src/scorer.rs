//! Composite response scoring: structural compliance plus semantic and
//! text-overlap metrics.
//!
//! Scoring never fails a benchmark run. Any internal error is absorbed into
//! a zero report and logged; callers cannot distinguish "scored zero" from
//! "failed to score" by the value alone, only by the log.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embeddings::Embedder;
use crate::error::{BenchError, Result};
use crate::sanitize;
use crate::utils::cosine_similarity;
use crate::utils::text::{lcs_f1, ngram_precision};

const SEMANTIC_WEIGHT: f32 = 0.4;
const LCS_WEIGHT: f32 = 0.2;
const NGRAM_WEIGHT: f32 = 0.1;
const NGRAM_MAX_ORDER: usize = 4;

/// Derived, immutable score for one evaluated response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// 1.0 with all mandatory sections, 0.5 otherwise. Never zero: partial
    /// credit keeps the metric smooth rather than cliff-edged.
    pub structure_score: f32,
    pub content_score: f32,
    /// (structure + content) * 5, clamped to [0, 10]
    pub total_score: f32,
}

impl ScoreReport {
    pub fn zero() -> Self {
        Self {
            structure_score: 0.0,
            content_score: 0.0,
            total_score: 0.0,
        }
    }

    fn from_parts(structure_score: f32, content_score: f32) -> Self {
        Self {
            structure_score,
            content_score,
            total_score: ((structure_score + content_score) * 5.0).clamp(0.0, 10.0),
        }
    }
}

pub struct Scorer {
    embedder: Arc<dyn Embedder>,
}

impl Scorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    fn structure_score(response_text: &str) -> f32 {
        if sanitize::is_valid(response_text) {
            1.0
        } else {
            0.5
        }
    }

    async fn content_score(&self, response_text: &str, reference_text: &str) -> Result<f32> {
        if response_text.trim().is_empty() || reference_text.trim().is_empty() {
            return Err(BenchError::Metric {
                message: "empty input to content scoring".to_string(),
            });
        }

        let embeddings = self
            .embedder
            .embed_batch(&[reference_text.to_string(), response_text.to_string()])
            .await
            .map_err(|e| BenchError::Metric {
                message: format!("embedding failed: {}", e),
            })?;
        let semantic = cosine_similarity(&embeddings[0], &embeddings[1]);

        let overlap_f1 = lcs_f1(response_text, reference_text);
        let ngram = ngram_precision(response_text, reference_text, NGRAM_MAX_ORDER);

        let content =
            semantic * SEMANTIC_WEIGHT + overlap_f1 * LCS_WEIGHT + ngram * NGRAM_WEIGHT;
        if !content.is_finite() {
            return Err(BenchError::Metric {
                message: format!("non-finite content score {content}"),
            });
        }
        Ok(content.max(0.0))
    }

    /// Score a response against an external reference. Expects text that
    /// already went through the sanitizer.
    pub async fn evaluate(&self, response_text: &str, reference_text: &str) -> ScoreReport {
        let structure = Self::structure_score(response_text);
        match self.content_score(response_text, reference_text).await {
            Ok(content) => {
                let report = ScoreReport::from_parts(structure, content);
                debug!(
                    "evaluation: structure={:.2} content={:.2} total={:.2}",
                    report.structure_score, report.content_score, report.total_score
                );
                report
            }
            Err(e) => {
                warn!("scoring failed, reporting zero: {}", e);
                ScoreReport::zero()
            }
        }
    }

    /// Score a response against itself. This measures internal consistency,
    /// not ground-truth accuracy: the overlap metrics are near-maximal by
    /// construction and the discriminative signal comes from structure.
    pub async fn coherence(&self, response_text: &str) -> ScoreReport {
        self.evaluate(response_text, response_text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;

    fn scorer() -> Scorer {
        Scorer::new(Arc::new(HashEmbedder::new(Some(256))))
    }

    const STRUCTURED: &str =
        "*Understanding:* the problem\n*Reasoning Pathway:* the steps\n*Final Synthesis:* the answer";

    #[tokio::test]
    async fn full_structure_scores_one() {
        let report = scorer().coherence(STRUCTURED).await;
        assert_eq!(report.structure_score, 1.0);
    }

    #[tokio::test]
    async fn missing_section_scores_half() {
        let partial = "*Understanding:* u\n*Reasoning Pathway:* r";
        let report = scorer().coherence(partial).await;
        assert_eq!(report.structure_score, 0.5);
    }

    #[tokio::test]
    async fn self_reference_content_is_near_maximal() {
        let report = scorer().coherence(STRUCTURED).await;
        // cosine = 1.0, lcs_f1 = 1.0, ngram = 1.0 against itself
        assert!(report.content_score > 0.65);
        assert!(report.content_score <= 0.71);
    }

    #[tokio::test]
    async fn empty_response_reports_zero() {
        let report = scorer().evaluate("", "reference").await;
        assert_eq!(report, ScoreReport::zero());
    }

    #[tokio::test]
    async fn total_score_is_clamped_to_ten() {
        let report = scorer().coherence(STRUCTURED).await;
        assert!(report.total_score <= 10.0);
        assert!(report.total_score > 0.0);
    }

    #[tokio::test]
    async fn unrelated_reference_scores_lower_than_self() {
        let s = scorer();
        let against_self = s.coherence(STRUCTURED).await;
        let against_other = s
            .evaluate(STRUCTURED, "completely unrelated reference material")
            .await;
        assert!(against_other.content_score < against_self.content_score);
    }
}
