//! The inbound dispatch request shape.

use serde::{Deserialize, Serialize};
use switchboard_core::{SessionId, SessionMode};

/// One tool-call request from the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub tool_id: String,
    pub arguments: serde_json::Value,
    pub session_id: SessionId,
    pub mode: SessionMode,

    /// Capability flags granted to the caller, passed through to handlers.
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// A confirmation token from an earlier ConfirmationRequired denial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,
}

impl DispatchRequest {
    pub fn new(
        session_id: SessionId,
        mode: SessionMode,
        tool_id: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            arguments,
            session_id,
            mode,
            capabilities: Vec::new(),
            confirmation_token: None,
        }
    }

    pub fn with_confirmation(mut self, token: impl Into<String>) -> Self {
        self.confirmation_token = Some(token.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }
}
