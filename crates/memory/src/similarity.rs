//! Argument similarity for redundancy detection.
//!
//! Exact canonical matches score 1.0. Otherwise arguments are reduced to a
//! lowercased token set (the `query` field when present, else every string
//! leaf) and compared with Jaccard overlap.

use std::collections::HashSet;
use switchboard_core::canonical::canonical_string;

/// Similarity of two argument objects in [0.0, 1.0].
pub fn argument_similarity(a: &serde_json::Value, b: &serde_json::Value) -> f64 {
    if canonical_string(a) == canonical_string(b) {
        return 1.0;
    }
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

fn token_set(args: &serde_json::Value) -> HashSet<String> {
    let mut text = String::new();
    match args.get("query").and_then(serde_json::Value::as_str) {
        Some(query) => text.push_str(query),
        None => collect_string_leaves(args, &mut text),
    }
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn collect_string_leaves(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_string_leaves(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_string_leaves(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_arguments_score_one() {
        let args = json!({"query": "weather in oslo", "limit": 5});
        assert_eq!(argument_similarity(&args, &args), 1.0);
        // Key order does not matter.
        assert_eq!(
            argument_similarity(
                &json!({"a": 1, "b": 2}),
                &json!({"b": 2, "a": 1})
            ),
            1.0
        );
    }

    #[test]
    fn near_identical_queries_score_high() {
        let score = argument_similarity(
            &json!({"query": "weather in Oslo today"}),
            &json!({"query": "Weather in oslo"}),
        );
        assert!(score >= 0.75, "score was {score}");
    }

    #[test]
    fn unrelated_queries_score_low() {
        let score = argument_similarity(
            &json!({"query": "weather in oslo"}),
            &json!({"query": "compile error in parser"}),
        );
        assert!(score < 0.2, "score was {score}");
    }

    #[test]
    fn falls_back_to_all_string_leaves() {
        let score = argument_similarity(
            &json!({"city": "Oslo", "country": "Norway"}),
            &json!({"city": "oslo", "country": "norway"}),
        );
        assert!(score > 0.9, "score was {score}");
    }

    #[test]
    fn no_text_means_no_similarity() {
        assert_eq!(
            argument_similarity(&json!({"n": 1}), &json!({"n": 2})),
            0.0
        );
    }
}
