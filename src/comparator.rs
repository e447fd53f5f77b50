//! Cross-response comparison: pairwise similarity, per-text coherence,
//! consensus selection, and significant-difference detection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::error::{BenchError, Result};
use crate::utils::cosine_similarity;
use crate::utils::split_sentences;

/// An unordered pair of texts whose similarity fell below the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Difference {
    pub first_idx: usize,
    pub second_idx: usize,
    pub similarity: f32,
    pub first_text: String,
    pub second_text: String,
}

/// Computed fresh per comparison call; persistence is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// N x N pairwise cosine similarity, symmetric, diagonal ~1.0
    pub similarity_matrix: Vec<Vec<f32>>,
    /// Mean similarity between consecutive sentence pairs, per text
    pub coherence_scores: Vec<f32>,
    /// Similarity of each text to the reference, when one was supplied
    pub content_preservation: Option<Vec<f32>>,
    /// Index of the text most similar, on average, to all others.
    /// Ties break to the lowest index.
    pub consensus_index: usize,
    pub differences: Vec<Difference>,
}

pub struct Comparator {
    embedder: Arc<dyn Embedder>,
}

impl Comparator {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Coherence of one text: 1.0 for a single sentence by convention,
    /// otherwise the mean cosine similarity over the sliding window of
    /// consecutive sentence pairs.
    async fn coherence(&self, text: &str) -> Result<f32> {
        let sentences = split_sentences(text);
        if sentences.len() < 2 {
            return Ok(1.0);
        }
        let embeddings = self
            .embedder
            .embed_batch(&sentences)
            .await
            .map_err(|e| BenchError::Embedding {
                message: e.to_string(),
            })?;
        let sum: f32 = embeddings
            .windows(2)
            .map(|pair| cosine_similarity(&pair[0], &pair[1]))
            .sum();
        Ok(sum / (embeddings.len() - 1) as f32)
    }

    pub async fn compare(
        &self,
        texts: &[String],
        reference: Option<&str>,
        threshold: f32,
    ) -> Result<ComparisonReport> {
        if texts.is_empty() {
            return Err(BenchError::Validation {
                message: "compare needs at least one text".to_string(),
            });
        }

        let embeddings = self
            .embedder
            .embed_batch(texts)
            .await
            .map_err(|e| BenchError::Embedding {
                message: e.to_string(),
            })?;

        let n = texts.len();
        let mut similarity_matrix = vec![vec![0.0f32; n]; n];
        for i in 0..n {
            for j in i..n {
                let sim = cosine_similarity(&embeddings[i], &embeddings[j]);
                similarity_matrix[i][j] = sim;
                similarity_matrix[j][i] = sim;
            }
        }

        let mut coherence_scores = Vec::with_capacity(n);
        for text in texts {
            coherence_scores.push(self.coherence(text).await?);
        }

        let content_preservation = match reference {
            Some(reference_text) => {
                let reference_embedding = self.embedder.embed(reference_text).await.map_err(
                    |e| BenchError::Embedding {
                        message: e.to_string(),
                    },
                )?;
                Some(
                    embeddings
                        .iter()
                        .map(|e| cosine_similarity(e, &reference_embedding))
                        .collect(),
                )
            }
            None => None,
        };

        // Row means include the diagonal; it shifts every row equally
        let mut consensus_index = 0;
        let mut best_mean = f32::NEG_INFINITY;
        for (i, row) in similarity_matrix.iter().enumerate() {
            let mean = row.iter().sum::<f32>() / n as f32;
            if mean > best_mean {
                best_mean = mean;
                consensus_index = i;
            }
        }

        let mut differences = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let similarity = similarity_matrix[i][j];
                if similarity < threshold {
                    differences.push(Difference {
                        first_idx: i,
                        second_idx: j,
                        similarity,
                        first_text: texts[i].clone(),
                        second_text: texts[j].clone(),
                    });
                }
            }
        }

        debug!(
            "compared {} texts: consensus={}, {} significant differences",
            n,
            consensus_index,
            differences.len()
        );

        Ok(ComparisonReport {
            similarity_matrix,
            coherence_scores,
            content_preservation,
            consensus_index,
            differences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;

    fn comparator() -> Comparator {
        Comparator::new(Arc::new(HashEmbedder::new(Some(256))))
    }

    fn near_identical_set() -> Vec<String> {
        vec![
            "The supply curve shifts right when production costs fall.".to_string(),
            "The supply curve shifts right when production costs decline.".to_string(),
            "The supply curve shifts right whenever production costs fall.".to_string(),
            "Photosynthesis converts sunlight into chemical energy in plants.".to_string(),
        ]
    }

    #[tokio::test]
    async fn matrix_is_symmetric_with_unit_diagonal() {
        let texts = near_identical_set();
        let report = comparator().compare(&texts, None, 0.75).await.unwrap();
        let m = &report.similarity_matrix;
        for i in 0..texts.len() {
            assert!((m[i][i] - 1.0).abs() < 1e-4, "diagonal not ~1.0");
            for j in 0..texts.len() {
                assert!((m[i][j] - m[j][i]).abs() < 1e-6, "matrix not symmetric");
            }
        }
    }

    #[tokio::test]
    async fn consensus_avoids_the_outlier() {
        let texts = near_identical_set();
        let report = comparator().compare(&texts, None, 0.75).await.unwrap();
        assert!(
            report.consensus_index < 3,
            "consensus landed on the outlier"
        );
    }

    #[tokio::test]
    async fn single_sentence_coherence_is_one() {
        let texts = vec!["One lone sentence".to_string()];
        let report = comparator().compare(&texts, None, 0.75).await.unwrap();
        assert_eq!(report.coherence_scores, vec![1.0]);
    }

    #[tokio::test]
    async fn differences_flag_dissimilar_pairs_only() {
        let texts = vec![
            "alpha beta gamma delta".to_string(),
            "alpha beta gamma delta".to_string(),
            "entirely different subject matter here".to_string(),
        ];
        let report = comparator().compare(&texts, None, 0.9).await.unwrap();
        // identical pair never flagged; the outlier pairs are
        assert!(report
            .differences
            .iter()
            .all(|d| !(d.first_idx == 0 && d.second_idx == 1)));
        assert!(!report.differences.is_empty());
        for d in &report.differences {
            assert!(d.first_idx < d.second_idx);
            assert!(d.similarity < 0.9);
        }
    }

    #[tokio::test]
    async fn reference_enables_content_preservation() {
        let texts = near_identical_set();
        let report = comparator()
            .compare(&texts, Some("Production costs shape the supply curve."), 0.75)
            .await
            .unwrap();
        let preservation = report.content_preservation.unwrap();
        assert_eq!(preservation.len(), texts.len());
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let err = comparator().compare(&[], None, 0.75).await.unwrap_err();
        assert!(matches!(err, BenchError::Validation { .. }));
    }
}
