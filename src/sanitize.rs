//! Response cleanup and structural validation.
//!
//! The cleaning pipeline is a fixed, order-sensitive sequence of idempotent
//! transforms; re-applying `clean` to its own output is a no-op.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const UNDERSTANDING: &str = "*Understanding:*";
pub const REASONING_PATHWAY: &str = "*Reasoning Pathway:*";
pub const COMPARATIVE_INSIGHTS: &str = "*Comparative Insights:*";
pub const ILLUSTRATIVE_EXAMPLE: &str = "*Illustrative Example:*";
pub const FINAL_SYNTHESIS: &str = "*Final Synthesis:*";

/// The three markers a response must carry to be structurally valid.
pub const MANDATORY_SECTIONS: [&str; 3] = [UNDERSTANDING, REASONING_PATHWAY, FINAL_SYNTHESIS];

static SPECIAL_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|.*?\|>").expect("valid regex"));
static LEAKED_SCAFFOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(HeaderCode:|Response:|Cognitive Architecture:).*?:").expect("valid regex")
});
static TRAILING_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"and \*.*?\* (structure|sections)\.").expect("valid regex")
});

/// Strip model artifacts and guarantee the canonical section markers.
///
/// Leniency is deliberate: a missing `*Understanding:*` marker is prepended
/// even when the content underneath is wrong. Presence, not correctness.
pub fn clean(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let text = SPECIAL_TOKENS.replace_all(raw, "");
    let text = LEAKED_SCAFFOLD.replace_all(&text, "");
    let text = TRAILING_BOILERPLATE.replace_all(&text, "");

    // Non-empty trimmed lines only
    let mut text = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if !text.contains(UNDERSTANDING) {
        text = format!("{}\n{}", UNDERSTANDING, text);
    }
    if !text.contains(REASONING_PATHWAY) && text.contains("Reasoning:") {
        text = text.replace("Reasoning:", REASONING_PATHWAY);
    }
    if !text.contains(FINAL_SYNTHESIS) && text.contains("Synthesis:") {
        text = text.replace("Synthesis:", FINAL_SYNTHESIS);
    }

    text
}

/// True iff all three mandatory markers are literally present.
/// A weak but deterministic contract: structure, not content.
pub fn is_valid(cleaned: &str) -> bool {
    MANDATORY_SECTIONS
        .iter()
        .all(|section| cleaned.contains(section))
}

/// Slice the cleaned text into its named sections. A section runs from its
/// marker to the next known marker or end of text. Absent or empty sections
/// are not reported.
pub fn sections(cleaned: &str) -> Vec<(&'static str, String)> {
    const ALL: [&str; 5] = [
        UNDERSTANDING,
        REASONING_PATHWAY,
        COMPARATIVE_INSIGHTS,
        ILLUSTRATIVE_EXAMPLE,
        FINAL_SYNTHESIS,
    ];

    let mut found: Vec<(usize, &'static str)> = ALL
        .iter()
        .filter_map(|&marker| cleaned.find(marker).map(|pos| (pos, marker)))
        .collect();
    found.sort_by_key(|&(pos, _)| pos);

    let mut out = Vec::new();
    for (i, &(pos, marker)) in found.iter().enumerate() {
        let start = pos + marker.len();
        let end = found
            .get(i + 1)
            .map(|&(next, _)| next)
            .unwrap_or(cleaned.len());
        let body = cleaned[start..end].trim();
        if !body.is_empty() {
            out.push((marker, body.to_string()));
        }
    }
    out
}

/// A cleaned completion with its recovered section structure.
/// Never mutated after validation: a failed validation triggers a fresh
/// query attempt, not a patch of this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    /// Raw completion text as returned by the endpoint
    pub raw_text: String,
    /// Text after the cleaning pipeline
    pub cleaned: String,
    /// Present, non-empty sections keyed by canonical marker
    pub sections: BTreeMap<String, String>,
}

impl StructuredResponse {
    pub fn from_raw(raw: &str) -> Self {
        let cleaned = clean(raw);
        let sections = sections(&cleaned)
            .into_iter()
            .map(|(marker, body)| (marker.to_string(), body))
            .collect();
        Self {
            raw_text: raw.to_string(),
            cleaned,
            sections,
        }
    }

    /// Structural validity: the three mandatory markers are present.
    pub fn is_valid(&self) -> bool {
        is_valid(&self.cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_special_tokens() {
        let cleaned = clean("<|im_start|>*Understanding:* hello<|im_end|>");
        assert!(!cleaned.contains("<|"));
        assert!(cleaned.contains("hello"));
    }

    #[test]
    fn prepends_missing_understanding_marker() {
        let cleaned = clean("just some text with no structure");
        assert!(cleaned.starts_with(UNDERSTANDING));
    }

    #[test]
    fn renames_bare_reasoning_and_synthesis_markers() {
        let cleaned = clean("*Understanding:* a\nReasoning: b\nSynthesis: c");
        assert!(cleaned.contains(REASONING_PATHWAY));
        assert!(cleaned.contains(FINAL_SYNTHESIS));
        assert!(is_valid(&cleaned));
    }

    #[test]
    fn clean_is_idempotent() {
        let samples = [
            "<|tok|>Reasoning: deduce\nSynthesis: done",
            "*Understanding:* u\n\n\n*Reasoning Pathway:* r\n*Final Synthesis:* s",
            "no markers at all",
            "HeaderCode: leaked: *Understanding:* u",
            "",
        ];
        for raw in samples {
            let once = clean(raw);
            let twice = clean(&once);
            assert_eq!(once, twice, "clean not idempotent for {raw:?}");
        }
    }

    #[test]
    fn validity_is_monotone_under_recleaning() {
        let raw = "*Understanding:* u\nReasoning: r\nSynthesis: s";
        let once = clean(raw);
        assert!(is_valid(&once));
        assert!(is_valid(&clean(&once)));
    }

    #[test]
    fn missing_final_synthesis_is_invalid() {
        let cleaned = clean("*Understanding:* u\n*Reasoning Pathway:* r");
        assert!(!is_valid(&cleaned));
    }

    #[test]
    fn drops_blank_lines() {
        let cleaned = clean("*Understanding:* a\n\n   \n*Reasoning Pathway:* b");
        assert!(!cleaned.contains("\n\n"));
    }

    #[test]
    fn sections_split_on_markers_in_order() {
        let cleaned = "*Understanding:* grasp\n*Reasoning Pathway:* steps\n*Final Synthesis:* answer";
        let secs = sections(cleaned);
        assert_eq!(secs.len(), 3);
        assert_eq!(secs[0].0, UNDERSTANDING);
        assert_eq!(secs[0].1, "grasp");
        assert_eq!(secs[2].1, "answer");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("   \n "), "");
        assert!(!is_valid(""));
    }
}
