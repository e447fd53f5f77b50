//! Benchmark result persistence: append-only JSONL records, per-model
//! aggregation, and CSV export.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BenchError, Result};
use crate::scorer::ScoreReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    pub model: String,
    pub agent_type: String,
    pub evaluation: ScoreReport,
}

pub struct BenchmarkTracker {
    save_path: PathBuf,
}

impl BenchmarkTracker {
    pub fn new(save_path: impl AsRef<Path>) -> Result<Self> {
        let save_path = save_path.as_ref().to_path_buf();
        if let Some(parent) = save_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { save_path })
    }

    /// Append one result. One JSON object per line.
    pub fn save_result(
        &self,
        model: &str,
        agent_type: &str,
        evaluation: ScoreReport,
    ) -> Result<()> {
        let record = BenchmarkRecord {
            timestamp: Utc::now().to_rfc3339(),
            model: model.to_string(),
            agent_type: agent_type.to_string(),
            evaluation,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.save_path)?;
        let line = serde_json::to_string(&record)?;
        writeln!(file, "{line}")?;
        info!(
            "saved result: model={} agent={} total={:.2}",
            model, agent_type, evaluation.total_score
        );
        Ok(())
    }

    /// Load all stored results. A missing file is an empty history.
    pub fn load_results(&self) -> Result<Vec<BenchmarkRecord>> {
        if !self.save_path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.save_path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| BenchError::Serialization {
                    message: format!("bad record in {}: {}", self.save_path.display(), e),
                })
            })
            .collect()
    }

    /// Aggregate total scores per model and agent type.
    pub fn compare_models(&self) -> Result<BTreeMap<String, BTreeMap<String, Vec<f32>>>> {
        let mut performance: BTreeMap<String, BTreeMap<String, Vec<f32>>> = BTreeMap::new();
        for record in self.load_results()? {
            performance
                .entry(record.model)
                .or_default()
                .entry(record.agent_type)
                .or_default()
                .push(record.evaluation.total_score);
        }
        Ok(performance)
    }

    /// Export the stored history as CSV next to the JSONL file.
    pub fn export_csv(&self, out_path: impl AsRef<Path>) -> Result<usize> {
        let records = self.load_results()?;
        let mut writer = csv::Writer::from_path(out_path.as_ref()).map_err(|e| {
            BenchError::Internal {
                message: format!("csv writer: {}", e),
            }
        })?;
        writer
            .write_record([
                "timestamp",
                "model",
                "agent_type",
                "structure_score",
                "content_score",
                "total_score",
            ])
            .map_err(|e| BenchError::Internal {
                message: format!("csv header: {}", e),
            })?;
        for record in &records {
            writer
                .write_record([
                    record.timestamp.as_str(),
                    record.model.as_str(),
                    record.agent_type.as_str(),
                    &record.evaluation.structure_score.to_string(),
                    &record.evaluation.content_score.to_string(),
                    &record.evaluation.total_score.to_string(),
                ])
                .map_err(|e| BenchError::Internal {
                    message: format!("csv record: {}", e),
                })?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}
