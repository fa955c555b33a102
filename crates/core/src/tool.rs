//! The handler trait and per-call execution context.
//!
//! A handler is the body behind a catalog entry. The catalog validates
//! arguments against the declared schema before a handler ever runs, so a
//! handler may assume its arguments are well-formed.

use crate::envelope::ToolFailure;
use crate::intent::Intent;
use crate::session::{SessionId, SessionMode};
use crate::state::SessionState;
use async_trait::async_trait;

/// Everything a handler gets for one call. Owned exclusively by that call
/// and never retained past it.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Unique id of this call (matches the model's tool_call id).
    pub call_id: String,

    /// The owning session.
    pub session_id: SessionId,

    /// The session's mode at dispatch time.
    pub mode: SessionMode,

    /// Capability flags granted to the caller.
    pub capabilities: Vec<String>,

    /// Schema-validated arguments.
    pub arguments: serde_json::Value,

    /// Read-only snapshot of session state at dispatch time.
    pub state: SessionState,
}

/// What a handler produces on success: a data payload plus zero or more
/// declarative state mutations.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub data: serde_json::Value,
    pub intents: Vec<Intent>,
}

impl ToolOutput {
    pub fn data(data: serde_json::Value) -> Self {
        Self { data, intents: Vec::new() }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }
}

/// A tool handler body.
///
/// Handlers may perform arbitrary async I/O and may run past their
/// declared latency budget (the overrun is logged, never aborted).
/// Handlers must not mutate session state — that is what intents are for.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, ctx: CallContext) -> Result<ToolOutput, ToolFailure>;
}
