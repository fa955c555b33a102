//! The summarization seam.
//!
//! Context assembly calls a `Summarizer` whenever the conversation grows
//! past the raw tail. The default is a deterministic extractive pass; a
//! host can plug in an LLM-backed implementation behind the same trait.

use crate::turn::ConversationTurn;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
#[error("summarization failed: {0}")]
pub struct SummarizeError(pub String);

/// Produces a rolling summary of the turns handed to it. The input is
/// always the full span to cover; partial extension is never requested.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, turns: &[ConversationTurn]) -> Result<String, SummarizeError>;
}

/// Deterministic extractive summarizer: the first sentence of each turn,
/// attributed to its speaker. Identical input always yields identical
/// output, which keeps cache behavior predictable.
#[derive(Debug, Default)]
pub struct ExtractiveSummarizer;

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, turns: &[ConversationTurn]) -> Result<String, SummarizeError> {
        let lines: Vec<String> = turns
            .iter()
            .filter(|t| !t.text.trim().is_empty())
            .map(|t| format!("{}: {}", t.speaker, first_sentence(&t.text)))
            .collect();
        Ok(lines.join(" "))
    }
}

fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.find(['.', '?', '!']) {
        Some(end) => trimmed[..=end].to_string(),
        None => trimmed.to_string(),
    }
}
