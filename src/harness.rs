//! Evaluation pipeline glue: technique lookup, query, scoring, persistence,
//! and longitudinal analysis over a rolling window of past responses.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::bench::{generate_question, technique_for_agent};
use crate::comparator::{Comparator, ComparisonReport};
use crate::config::Config;
use crate::embeddings::create_embedder;
use crate::error::Result;
use crate::gateway::{CompletionTransport, Gateway};
use crate::prompts::Technique;
use crate::sanitize::StructuredResponse;
use crate::scorer::{ScoreReport, Scorer};
use crate::topics::TopicClusterer;
use crate::tracker::BenchmarkTracker;

/// How many of the most recent responses a new one is compared against.
const COMPARISON_LOOKBACK: usize = 3;

/// Similarity floor for merging responses into an existing topic.
const TOPIC_ASSIGN_THRESHOLD: f32 = 0.6;

/// Everything one evaluation run produced.
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub agent_type: String,
    pub technique: Technique,
    pub question: String,
    pub response: StructuredResponse,
    pub report: ScoreReport,
    /// Comparison of this response against the rolling window, when the
    /// window was non-empty
    pub history_comparison: Option<ComparisonReport>,
    pub emerged_topics: Vec<i64>,
}

pub struct Harness {
    config: Config,
    gateway: Gateway,
    scorer: Scorer,
    comparator: Comparator,
    topics: Mutex<TopicClusterer>,
    tracker: BenchmarkTracker,
    history: Mutex<VecDeque<String>>,
}

impl Harness {
    pub fn new(config: Config) -> Result<Self> {
        let gateway = Gateway::new(&config)?;
        Self::with_gateway(config, gateway)
    }

    /// Test seam: callers inject a gateway with a scripted transport.
    pub fn with_gateway(config: Config, gateway: Gateway) -> Result<Self> {
        let embedder = create_embedder(&config)?;
        let scorer = Scorer::new(Arc::clone(&embedder));
        let comparator = Comparator::new(Arc::clone(&embedder));
        let topics = Mutex::new(TopicClusterer::new(
            Arc::clone(&embedder),
            config.evaluation.min_topic_size,
            TOPIC_ASSIGN_THRESHOLD,
        ));
        let tracker = BenchmarkTracker::new(&config.tracker.results_path)?;
        Ok(Self {
            config,
            gateway,
            scorer,
            comparator,
            topics,
            tracker,
            history: Mutex::new(VecDeque::new()),
        })
    }

    pub fn with_transport(
        config: Config,
        transport: Arc<dyn CompletionTransport>,
    ) -> Result<Self> {
        let gateway = Gateway::with_transport(&config, transport)?;
        Self::with_gateway(config, gateway)
    }

    pub fn tracker(&self) -> &BenchmarkTracker {
        &self.tracker
    }

    /// Run one full evaluation for an agent type: pick a question, query,
    /// score, persist, then fold the response into the longitudinal state.
    pub async fn evaluate_agent(&self, agent_type: &str) -> Result<EvaluationOutcome> {
        let technique = technique_for_agent(agent_type);
        let question = generate_question(agent_type);
        self.evaluate_question(agent_type, &question, technique).await
    }

    /// Same pipeline with a caller-supplied question.
    pub async fn evaluate_question(
        &self,
        agent_type: &str,
        question: &str,
        technique: Technique,
    ) -> Result<EvaluationOutcome> {
        let response = self.gateway.query(question, technique).await?;

        // No external reference exists for generated questions, so this is
        // a coherence score, not an accuracy score.
        let report = self.scorer.coherence(&response.cleaned).await;
        self.check_readiness(&report);

        self.tracker
            .save_result(&self.config.llm.model, agent_type, report)?;

        let history_comparison = self.compare_with_history(&response.cleaned).await;
        let emerged_topics = self.update_topics(&response.cleaned).await;

        Ok(EvaluationOutcome {
            agent_type: agent_type.to_string(),
            technique,
            question: question.to_string(),
            response,
            report,
            history_comparison,
            emerged_topics,
        })
    }

    fn check_readiness(&self, report: &ScoreReport) {
        if let Some(&min_total) = self
            .config
            .evaluation
            .readiness_thresholds
            .get("min_total_score")
            && report.total_score < min_total
        {
            warn!(
                "total score {:.2} below readiness threshold {:.2}",
                report.total_score, min_total
            );
        }
    }

    /// Compare the new response against the last few in the window, then
    /// admit it to the window.
    async fn compare_with_history(&self, cleaned: &str) -> Option<ComparisonReport> {
        let mut history = self.history.lock().await;

        let comparison = if history.is_empty() {
            None
        } else {
            let mut texts = vec![cleaned.to_string()];
            texts.extend(
                history
                    .iter()
                    .rev()
                    .take(COMPARISON_LOOKBACK)
                    .cloned(),
            );
            match self
                .comparator
                .compare(&texts, None, self.config.evaluation.similarity_threshold)
                .await
            {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("history comparison failed: {}", e);
                    None
                }
            }
        };

        history.push_back(cleaned.to_string());
        while history.len() > self.config.evaluation.history_window {
            history.pop_front();
        }
        comparison
    }

    async fn update_topics(&self, cleaned: &str) -> Vec<i64> {
        let mut topics = self.topics.lock().await;
        match topics.update(&[cleaned.to_string()]).await {
            Ok(emerged) => emerged,
            Err(e) => {
                warn!("topic update failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Batch evaluation across many questions with one agent type;
    /// failures are skipped with a log line, not fatal.
    pub async fn evaluate_batch(
        &self,
        agent_type: &str,
        questions: &[String],
    ) -> Vec<Result<EvaluationOutcome>> {
        let mut outcomes = Vec::with_capacity(questions.len());
        let technique = technique_for_agent(agent_type);
        for question in questions {
            let outcome = self.evaluate_question(agent_type, question, technique).await;
            if let Err(e) = &outcome {
                info!("skipping failed question {:?}: {}", question, e);
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
