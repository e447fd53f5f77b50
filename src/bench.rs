//! Benchmark question bank: agent types, their reasoning techniques, and
//! the static question pools, plus an LLM-backed generator for novel
//! questions.

use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::error::Result;
use crate::gateway::Gateway;
use crate::prompts::Technique;

/// The agent archetypes the harness evaluates.
pub const AGENT_TYPES: [&str; 5] = [
    "Multi-Step Critical Thinking Agent",
    "Backtracking & Self-Correcting Agent",
    "Multi-Perspective Analysis Agent",
    "Decision-Making Agent",
    "Autonomous Planning Agent",
];

/// Reasoning technique mapped to each agent type.
pub fn technique_for_agent(agent_type: &str) -> Technique {
    let technique = match agent_type {
        "Multi-Step Critical Thinking Agent" => Technique::TreeOfThoughts,
        "Backtracking & Self-Correcting Agent" => Technique::SelfCritique,
        "Multi-Perspective Analysis Agent" => Technique::MultiPerspective,
        "Decision-Making Agent" => Technique::SelfConsistency,
        _ => Technique::Default,
    };
    info!(
        "Selected technique '{}' for agent type: {}",
        technique, agent_type
    );
    technique
}

/// Benchmarks relevant to each agent type.
pub fn benchmarks_for_agent(agent_type: &str) -> &'static [&'static str] {
    match agent_type {
        "Multi-Step Critical Thinking Agent" => {
            &["BIG-Bench Hard (BBH)", "ARC (AI2 Reasoning Challenge)"]
        }
        "Backtracking & Self-Correcting Agent" => &["MATH (Math 500)", "PhysicsQA"],
        "Multi-Perspective Analysis Agent" => &["TruthfulQA", "LawBench", "MMLU-Advanced"],
        "Decision-Making Agent" => &["BBH (BigBench Hard Subset)", "MMLU (Advanced Topics)"],
        "Autonomous Planning Agent" => &["HumanEval", "MBPP"],
        _ => &[],
    }
}

pub fn question_pool(benchmark: &str) -> &'static [&'static str] {
    match benchmark {
        "MMLU (Advanced Topics)" => &[
            "Explain the key principles of Bayesian inference and their application in real-world decision-making.",
            "Describe the role of entropy in information theory and how it impacts data compression.",
        ],
        "BIG-Bench Hard (BBH)" => &[
            "Given a logical rule set, determine the most probable conclusion.",
            "Solve this multi-step reasoning puzzle using deductive logic.",
        ],
        "MATH (Math 500)" => &[
            "Solve for x: If 2x + 3y = 7 and x - y = 2, find the values of x and y.",
            "Compute the definite integral of (3x^2 + 2x - 5) dx.",
        ],
        "PhysicsQA" => &[
            "Explain the relationship between energy and momentum in classical mechanics.",
            "Given a projectile motion equation, determine the optimal launch angle for maximum range.",
        ],
        "BBH (BigBench Hard Subset)" => &[
            "How should a startup balance growth and profitability when seeking funding?",
            "Analyze the strategic trade-offs between vertical and horizontal scaling in cloud infrastructure.",
        ],
        "LawBench" => &[
            "Explain how case law precedents influence judicial decisions.",
            "How does international law address conflicts between sovereignty and human rights?",
        ],
        "HumanEval" => &[
            "Write a Python function that returns the nth Fibonacci number.",
            "Implement an efficient sorting algorithm that operates in O(n log n) complexity.",
        ],
        "TruthfulQA" => &[
            "What are the ethical implications of AI making autonomous medical diagnoses?",
            "How can policymakers balance free speech and misinformation in digital platforms?",
        ],
        "ARC (AI2 Reasoning Challenge)" => &[
            "What is the next number in the pattern: 2, 6, 12, 20, ...?",
            "Given a sequence of geometric transformations, determine the final shape and position.",
        ],
        "MMLU-Advanced" => &[
            "Discuss the philosophical implications of the Turing Test in the age of advanced AI.",
            "Analyze the economic impact of machine learning-driven automation in developing nations.",
        ],
        _ => &[],
    }
}

/// Pick a benchmark question for an agent type from the static bank.
pub fn generate_question(agent_type: &str) -> String {
    let benchmarks = benchmarks_for_agent(agent_type);
    let mut rng = rand::thread_rng();
    let Some(&benchmark) = benchmarks.choose(&mut rng) else {
        warn!("No benchmarks found for agent type '{}'", agent_type);
        return "No valid benchmark question available for this agent type.".to_string();
    };
    let pool = question_pool(benchmark);
    let Some(&question) = pool.choose(&mut rng) else {
        warn!("No questions found for benchmark '{}'", benchmark);
        return "No valid question available for this benchmark.".to_string();
    };
    info!(
        "Selected question from '{}' for '{}': {}",
        benchmark, agent_type, question
    );
    question.to_string()
}

fn generation_focus(agent_type: &str) -> &'static str {
    match agent_type {
        "Multi-Step Critical Thinking Agent" => {
            "multiple logical deductions with hidden dependencies and error checking; \
             focus on system analysis or algorithmic thinking"
        }
        "Backtracking & Self-Correcting Agent" => {
            "multiple solution paths with error detection and recovery strategies; \
             focus on proofs or optimization"
        }
        "Multi-Perspective Analysis Agent" => {
            "multiple viewpoints with trade-off analysis and framework synthesis; \
             focus on policy or ethics"
        }
        "Decision-Making Agent" => {
            "trade-off analysis, risk assessment and resource allocation; \
             focus on strategy or design"
        }
        "Autonomous Planning Agent" => {
            "constraint handling, contingency planning and failure recovery; \
             focus on planning or architecture"
        }
        _ => "a challenging reasoning problem",
    }
}

/// Asks the LLM to design a novel benchmark question for an agent type.
pub struct QuestionGenerator<'a> {
    gateway: &'a Gateway,
}

impl<'a> QuestionGenerator<'a> {
    pub fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    pub async fn generate(&self, agent_type: &str) -> Result<String> {
        let request = format!(
            "You are an expert in cognitive assessment design. Generate a challenging \
             benchmark question for the {}. The question must require {}. It must be \
             clear and unambiguous, challenging but solvable, and focused on reasoning \
             over recall.",
            agent_type,
            generation_focus(agent_type)
        );
        info!("Generating benchmark question for {}", agent_type);
        let response = self.gateway.query(&request, Technique::Default).await?;
        Ok(response.cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_agent_type_has_a_technique_and_benchmarks() {
        for agent_type in AGENT_TYPES {
            let _ = technique_for_agent(agent_type);
            assert!(
                !benchmarks_for_agent(agent_type).is_empty(),
                "{agent_type} has no benchmarks"
            );
        }
    }

    #[test]
    fn unknown_agent_type_gets_default_technique() {
        assert_eq!(technique_for_agent("Mystery Agent"), Technique::Default);
    }

    #[test]
    fn generated_questions_come_from_the_bank() {
        for _ in 0..10 {
            let question = generate_question("Decision-Making Agent");
            let known: Vec<&str> = benchmarks_for_agent("Decision-Making Agent")
                .iter()
                .flat_map(|&b| question_pool(b).iter().copied())
                .collect();
            assert!(known.contains(&question.as_str()));
        }
    }

    #[test]
    fn unknown_agent_type_gets_fallback_question() {
        let question = generate_question("Mystery Agent");
        assert!(question.contains("No valid benchmark question"));
    }

    #[tokio::test]
    async fn question_generator_returns_cleaned_text() {
        use crate::config::Config;
        use crate::error::Result as BenchResult;
        use crate::gateway::CompletionTransport;
        use async_trait::async_trait;
        use std::sync::Arc;

        struct CannedTransport;

        #[async_trait]
        impl CompletionTransport for CannedTransport {
            async fn complete(&self, _prompt: &str) -> BenchResult<String> {
                Ok("<|tok|>*Understanding:* scope\n*Reasoning Pathway:* design\n\
                    *Final Synthesis:* A novel question about resource allocation."
                    .to_string())
            }
        }

        let mut config = Config::default();
        config.cache.dir = Some(tempfile::tempdir().unwrap().keep());
        let gateway = Gateway::with_transport(&config, Arc::new(CannedTransport)).unwrap();

        let question = QuestionGenerator::new(&gateway)
            .generate("Autonomous Planning Agent")
            .await
            .unwrap();
        assert!(question.contains("resource allocation"));
        assert!(!question.contains("<|"));
    }
}
