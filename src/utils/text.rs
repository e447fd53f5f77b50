//! Text segmentation and overlap metrics used by the scorer and comparator.

use std::collections::HashMap;

/// Split text into sentences on terminal punctuation. Empty fragments are
/// dropped; text without terminators comes back as a single sentence.
pub fn split_sentences(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in s.chars() {
        cur.push(ch);
        if (ch == '.' || ch == '!' || ch == '?') && !cur.trim().is_empty() {
            out.push(cur.trim().to_string());
            cur.clear();
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur.trim().to_string());
    }
    if out.is_empty() && !s.trim().is_empty() {
        out.push(s.trim().to_string());
    }
    out
}

fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Length of the longest common subsequence over word tokens.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Two-row DP keeps memory at O(min side)
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut cur = vec![0usize; short.len() + 1];
    for x in long {
        for (j, y) in short.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[short.len()]
}

/// LCS-based overlap F1 between a prediction and a reference, over word
/// tokens. 0.0 when either side is empty.
pub fn lcs_f1(prediction: &str, reference: &str) -> f32 {
    let pred = tokenize(prediction);
    let refr = tokenize(reference);
    if pred.is_empty() || refr.is_empty() {
        return 0.0;
    }
    let lcs = lcs_len(&pred, &refr) as f32;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / pred.len() as f32;
    let recall = lcs / refr.len() as f32;
    2.0 * precision * recall / (precision + recall)
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts: HashMap<&[String], usize> = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

/// Clipped n-gram precision overlap for n = 1..=max_order, combined as a
/// geometric mean. 0.0 if any order has no overlap.
pub fn ngram_precision(prediction: &str, reference: &str, max_order: usize) -> f32 {
    let pred = tokenize(prediction);
    let refr = tokenize(reference);
    if pred.is_empty() || refr.is_empty() {
        return 0.0;
    }

    let mut log_sum = 0.0f32;
    let mut orders = 0usize;
    for n in 1..=max_order {
        if pred.len() < n {
            break;
        }
        let pred_counts = ngram_counts(&pred, n);
        let ref_counts = ngram_counts(&refr, n);
        let total: usize = pred_counts.values().sum();
        let matched: usize = pred_counts
            .iter()
            .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
            .sum();
        if matched == 0 || total == 0 {
            return 0.0;
        }
        log_sum += (matched as f32 / total as f32).ln();
        orders += 1;
    }
    if orders == 0 {
        return 0.0;
    }
    (log_sum / orders as f32).exp()
}
