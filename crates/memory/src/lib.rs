//! Session-scoped memory of recent tool calls.
//!
//! Every dispatched call is recorded here so later turns can answer "what
//! did that search return?" without re-running the tool. Memory is bounded
//! by a recency window: the newest calls keep their full response payload,
//! older ones are demoted to one-line summaries, and the oldest are dropped
//! outright. The store also powers redundancy detection, flagging a new
//! call whose arguments closely match a prior successful one.

mod record;
mod similarity;
mod store;

pub use record::{MemoryQuery, RecordPayload, RecordSummary, ToolCallRecord};
pub use similarity::argument_similarity;
pub use store::{SimilarCall, ToolMemory};
