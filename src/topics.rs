//! Incremental embedding-based topic clustering.
//!
//! A lightweight centroid model: documents join the nearest centroid above
//! a similarity floor or open a new cluster; clusters that never reach
//! `min_topic_size` report the outlier id. The model state is owned here
//! and mutated through `&mut self`, so exclusive access is enforced by the
//! borrow checker; share it behind a mutex if multiple tasks need it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::error::{BenchError, Result};
use crate::utils::cosine_similarity;
use crate::utils::math::dot;

/// Reserved id for documents that fit no cluster.
pub const OUTLIER_TOPIC: i64 = -1;

/// Embedding batches are bounded to keep memory flat on large inputs.
const BATCH_SIZE: usize = 32;

struct Document {
    text: String,
    embedding: Vec<f32>,
    cluster: usize,
}

struct Cluster {
    id: i64,
    centroid: Vec<f32>,
    members: Vec<usize>,
}

/// Result of one extraction pass.
#[derive(Debug, Clone)]
pub struct TopicExtraction {
    /// Topic id per input text, positionally aligned; -1 marks outliers
    pub assignments: Vec<i64>,
    /// Representative document per real topic (outliers have none)
    pub representatives: BTreeMap<i64, String>,
}

pub struct TopicClusterer {
    embedder: Arc<dyn Embedder>,
    min_topic_size: usize,
    assign_threshold: f32,
    documents: Vec<Document>,
    clusters: Vec<Cluster>,
    next_id: i64,
    /// Topic ids already reported; update() diffs against this set
    seen_topics: HashSet<i64>,
}

impl TopicClusterer {
    pub fn new(embedder: Arc<dyn Embedder>, min_topic_size: usize, assign_threshold: f32) -> Self {
        Self {
            embedder,
            min_topic_size: min_topic_size.max(1),
            assign_threshold,
            documents: Vec::new(),
            clusters: Vec::new(),
            next_id: 0,
            seen_topics: HashSet::new(),
        }
    }

    fn nearest_cluster(&self, embedding: &[f32]) -> Option<(usize, f32)> {
        self.clusters
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, cosine_similarity(embedding, &c.centroid)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn assign(&mut self, text: String, embedding: Vec<f32>) -> usize {
        let doc_idx = self.documents.len();
        let cluster_idx = match self.nearest_cluster(&embedding) {
            Some((idx, sim)) if sim >= self.assign_threshold => {
                // Incremental centroid update keeps the mean exact
                let cluster = &mut self.clusters[idx];
                let n = cluster.members.len() as f32;
                for (c, e) in cluster.centroid.iter_mut().zip(embedding.iter()) {
                    *c = (*c * n + e) / (n + 1.0);
                }
                cluster.members.push(doc_idx);
                idx
            }
            _ => {
                let id = self.next_id;
                self.next_id += 1;
                self.clusters.push(Cluster {
                    id,
                    centroid: embedding.clone(),
                    members: vec![doc_idx],
                });
                self.clusters.len() - 1
            }
        };
        self.documents.push(Document {
            text,
            embedding,
            cluster: cluster_idx,
        });
        doc_idx
    }

    /// Embed and assign texts in fixed-size batches; returns document
    /// indices aligned with the input.
    async fn ingest(&mut self, texts: &[String]) -> Result<Vec<usize>> {
        let mut doc_indices = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embeddings =
                self.embedder
                    .embed_batch(batch)
                    .await
                    .map_err(|e| BenchError::Embedding {
                        message: e.to_string(),
                    })?;
            for (text, embedding) in batch.iter().zip(embeddings) {
                doc_indices.push(self.assign(text.clone(), embedding));
            }
        }
        Ok(doc_indices)
    }

    fn effective_id(&self, cluster_idx: usize) -> i64 {
        let cluster = &self.clusters[cluster_idx];
        if cluster.members.len() >= self.min_topic_size {
            cluster.id
        } else {
            OUTLIER_TOPIC
        }
    }

    fn current_topic_ids(&self) -> HashSet<i64> {
        self.clusters
            .iter()
            .filter(|c| c.members.len() >= self.min_topic_size)
            .map(|c| c.id)
            .collect()
    }

    /// Representative document = the member closest to the cluster mean
    /// by dot product.
    fn representative(&self, cluster: &Cluster) -> Option<String> {
        cluster
            .members
            .iter()
            .map(|&doc_idx| {
                let doc = &self.documents[doc_idx];
                (doc_idx, dot(&doc.embedding, &cluster.centroid))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(doc_idx, _)| self.documents[doc_idx].text.clone())
    }

    /// Cluster a batch of texts and report assignments plus a
    /// representative per discovered topic.
    pub async fn extract(&mut self, texts: &[String]) -> Result<TopicExtraction> {
        if texts.is_empty() {
            return Err(BenchError::Validation {
                message: "extract needs at least one text".to_string(),
            });
        }
        let doc_indices = self.ingest(texts).await?;

        let assignments: Vec<i64> = doc_indices
            .iter()
            .map(|&doc_idx| self.effective_id(self.documents[doc_idx].cluster))
            .collect();

        let mut representatives = BTreeMap::new();
        for cluster in &self.clusters {
            if cluster.members.len() >= self.min_topic_size
                && let Some(doc) = self.representative(cluster)
            {
                representatives.insert(cluster.id, doc);
            }
        }

        self.seen_topics.extend(self.current_topic_ids());
        debug!(
            "extracted {} topics over {} documents",
            representatives.len(),
            self.documents.len()
        );

        Ok(TopicExtraction {
            assignments,
            representatives,
        })
    }

    /// Fold new texts into the model and report newly-emerged topic ids.
    /// Eventually consistent, not transactional; callers serialize access.
    pub async fn update(&mut self, new_texts: &[String]) -> Result<Vec<i64>> {
        if new_texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ingest(new_texts).await?;

        let current = self.current_topic_ids();
        let mut emerged: Vec<i64> = current.difference(&self.seen_topics).copied().collect();
        emerged.sort_unstable();
        self.seen_topics.extend(current);

        if !emerged.is_empty() {
            info!("newly emerged topics: {:?}", emerged);
        }
        Ok(emerged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;

    fn clusterer(threshold: f32) -> TopicClusterer {
        TopicClusterer::new(Arc::new(HashEmbedder::new(Some(256))), 2, threshold)
    }

    fn corpus() -> Vec<String> {
        vec![
            "the cat sat on the mat and purred".to_string(),
            "the cat sat on the mat and slept".to_string(),
            "the cat sat on the mat and yawned".to_string(),
            "interest rates rose and bond prices fell sharply".to_string(),
            "interest rates rose and bond yields climbed again".to_string(),
        ]
    }

    #[tokio::test]
    async fn similar_texts_share_a_topic() {
        let mut tc = clusterer(0.5);
        let extraction = tc.extract(&corpus()).await.unwrap();
        assert_eq!(extraction.assignments.len(), 5);
        assert_eq!(extraction.assignments[0], extraction.assignments[1]);
        assert_eq!(extraction.assignments[1], extraction.assignments[2]);
        assert_eq!(extraction.assignments[3], extraction.assignments[4]);
        assert_ne!(extraction.assignments[0], extraction.assignments[3]);
    }

    #[tokio::test]
    async fn tiny_clusters_are_outliers() {
        let mut tc = clusterer(0.99);
        // threshold so high nothing merges; every cluster stays below
        // min_topic_size and reports the sentinel
        let extraction = tc
            .extract(&[
                "completely distinct first".to_string(),
                "utterly unrelated second".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(extraction.assignments, vec![OUTLIER_TOPIC, OUTLIER_TOPIC]);
        assert!(extraction.representatives.is_empty());
    }

    #[tokio::test]
    async fn representatives_come_from_their_topic() {
        let mut tc = clusterer(0.5);
        let texts = corpus();
        let extraction = tc.extract(&texts).await.unwrap();
        for (&topic_id, representative) in &extraction.representatives {
            assert_ne!(topic_id, OUTLIER_TOPIC);
            assert!(texts.contains(representative));
        }
    }

    #[tokio::test]
    async fn update_reports_newly_emerged_topics_once() {
        let mut tc = clusterer(0.5);
        tc.extract(&corpus()[..3].to_vec()).await.unwrap();

        let emerged = tc.update(&corpus()[3..].to_vec()).await.unwrap();
        assert_eq!(emerged.len(), 1, "the rates topic should emerge");

        // Same topic again: nothing new
        let again = tc
            .update(&["interest rates rose and bond markets reacted".to_string()])
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn empty_extract_is_rejected() {
        let mut tc = clusterer(0.5);
        assert!(tc.extract(&[]).await.is_err());
    }
}
