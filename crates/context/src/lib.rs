//! Conversation context assembly.
//!
//! Maintains a token-bounded view of each session's dialogue for the model
//! call: a verbatim raw tail of recent turns, a rolling summary of
//! everything older, and a fingerprint-keyed cache of the assembled
//! payload. Independent of tool dispatch; the orchestrator feeds turns in
//! and asks for the payload before each model call.

mod manager;
mod summarizer;
pub mod token;
mod turn;

pub use manager::{AssemblyOutcome, ContextManager};
pub use summarizer::{ExtractiveSummarizer, SummarizeError, Summarizer};
pub use turn::{AssembledContext, ConversationTurn, Speaker};
