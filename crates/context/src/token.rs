//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, accurate
//! within ~10% for BPE tokenizers on English text. Good enough for budget
//! enforcement; nothing downstream depends on exact counts.

use crate::turn::ConversationTurn;

/// Estimate the token count for a string. 1 token ≈ 4 characters, rounded
/// up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for one turn including per-message overhead for role
/// name and delimiters in the wire format.
pub fn estimate_turn_tokens(turn: &ConversationTurn) -> usize {
    4 + estimate_tokens(&turn.text)
}

/// Estimate tokens for a whole payload: optional summary block plus every
/// raw turn.
pub fn estimate_payload_tokens(summary: Option<&str>, turns: &[ConversationTurn]) -> usize {
    let summary_tokens = summary.map(|s| 4 + estimate_tokens(s)).unwrap_or(0);
    summary_tokens + turns.iter().map(estimate_turn_tokens).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn turn_includes_overhead() {
        assert_eq!(estimate_turn_tokens(&ConversationTurn::user("test")), 5);
    }

    #[test]
    fn payload_sums_summary_and_turns() {
        let turns = vec![
            ConversationTurn::user("hello"),
            ConversationTurn::assistant("world"),
        ];
        assert_eq!(estimate_payload_tokens(None, &turns), 12);
        // "summary." is 8 chars → 2 tokens + 4 overhead.
        assert_eq!(estimate_payload_tokens(Some("summary."), &turns), 18);
    }
}
