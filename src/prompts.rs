//! Prompt construction by reasoning technique.
//!
//! Every template ends with the same three-section response contract that
//! `sanitize::is_valid` checks, so the two modules must stay in sync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named reasoning scaffold applied to a question before it is sent out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    TreeOfThoughts,
    SelfCritique,
    MultiPerspective,
    SelfConsistency,
    #[default]
    Default,
}

impl Technique {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::TreeOfThoughts => "tree-of-thoughts",
            Technique::SelfCritique => "self-critique",
            Technique::MultiPerspective => "multi-perspective",
            Technique::SelfConsistency => "self-consistency",
            Technique::Default => "default",
        }
    }

    pub fn all() -> &'static [Technique] {
        &[
            Technique::TreeOfThoughts,
            Technique::SelfCritique,
            Technique::MultiPerspective,
            Technique::SelfConsistency,
            Technique::Default,
        ]
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to the default meta-learning technique
    /// rather than failing; prompt construction has no failure modes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "tree-of-thoughts" => Technique::TreeOfThoughts,
            "self-critique" => Technique::SelfCritique,
            "multi-perspective" => Technique::MultiPerspective,
            "self-consistency" => Technique::SelfConsistency,
            _ => Technique::Default,
        })
    }
}

const SYSTEM_FRAMING: &str = "You are an advanced reasoning system employing multiple cognitive frameworks:

1. Meta-Learning Framework
   - Dynamically adapt reasoning strategies
   - Learn from intermediate deductions
   - Refine approach based on solution quality

2. Multi-Agent Simulation
   - Simulate diverse expert perspectives
   - Debate and critique solutions
   - Resolve conflicts through synthesis

3. Structured Reasoning Pipeline
   - Decompose, analyze, synthesize, validate
   - Generate multiple solution paths
   - Cross-validate through different frameworks

4. Solution Optimization
   - Evaluate trade-offs quantitatively
   - Consider edge cases and limitations
   - Optimize for robustness and generality";

/// The response contract every template mandates. `sanitize::is_valid`
/// checks for the three non-optional markers.
const RESPONSE_CONTRACT: &str = "Response Format:
*Understanding:* [Context and problem breakdown through chain of thought]
*Reasoning Pathway:* [Logical breakdown of the approach]
*Comparative Insights:* [Optional - pros & cons, trade-offs]
*Illustrative Example:* [Optional - a real-world analogy or code/math example]
*Final Synthesis:* [Validated output, optimized response]

Your response MUST follow the exact format with *Header:* markers. The
*Understanding:*, *Reasoning Pathway:* and *Final Synthesis:* sections are
mandatory.";

fn reasoning_guide(technique: Technique) -> &'static str {
    match technique {
        Technique::TreeOfThoughts => {
            "Apply Tree-of-Thoughts framework:
1. Meta-cognitive decomposition of the problem
2. Branch exploration:
   - Branch A: logical deduction
   - Branch B: pattern recognition
   - Branch C: constraint analysis
3. Cross-branch evaluation
4. Solution synthesis"
        }
        Technique::SelfCritique => {
            "Apply Self-Critique framework:
1. Draft an initial solution
2. Attack your own assumptions and locate errors
3. Backtrack and repair each flaw found
4. Present the corrected solution"
        }
        Technique::MultiPerspective => {
            "Apply Multi-Perspective framework:
1. Identify the stakeholder and disciplinary perspectives relevant to the problem
2. Analyze the problem independently from each perspective
3. Surface conflicts and trade-offs between perspectives
4. Reconcile them into a balanced synthesis"
        }
        Technique::SelfConsistency => {
            "Apply Self-Consistency framework:
1. Generate 3 independent solutions using different approaches
2. Cross-framework validation of each solution
3. Consistency analysis across the 3 solutions
4. Robust synthesis of the agreeing answer"
        }
        Technique::Default => {
            "Apply Meta-Learning framework:
1. Problem characterization
2. Framework selection
3. Solution optimization"
        }
    }
}

/// Wrap a raw question into a technique-specific structured prompt.
/// Pure function, no side effects.
pub fn format_prompt(question: &str, technique: Technique) -> String {
    format!(
        "{}\n\nTask: {}\n\n{}\n\n{}",
        SYSTEM_FRAMING,
        question,
        reasoning_guide(technique),
        RESPONSE_CONTRACT
    )
}
