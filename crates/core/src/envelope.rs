//! The uniform response wrapper returned by every dispatch.
//!
//! Every rejection stage — schema validation, policy, loop detection, the
//! handler itself — produces the same `Envelope` shape, so the agent loop
//! branches on exactly one success/failure discriminant regardless of where
//! a call was stopped.

use crate::intent::Intent;
use serde::{Deserialize, Serialize};

/// Classification of a failed call by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Arguments rejected before the handler ran. Retrying without
    /// changing the arguments cannot succeed.
    Validation,
    /// The tool is not available in the session's current mode.
    ModeRestricted,
    /// The per-turn quota for the tool's category is exhausted.
    BudgetExceeded,
    /// The tool needs a confirmation token before it will run.
    ConfirmationRequired,
    /// The call was refused because the agent is repeating itself.
    LoopDetected,
    /// Handler-raised, safe to retry as-is.
    Transient,
    /// Handler-raised, retrying will not help.
    Permanent,
    /// Handler-raised, an upstream dependency is rate limiting us.
    RateLimit,
    /// Handler-raised authentication/authorization failure.
    Auth,
    /// Handler-raised conflict with concurrent state.
    Conflict,
    /// The owning session is no longer active.
    SessionInactive,
    /// An unexpected failure inside dispatch or the handler.
    Internal,
}

impl ErrorKind {
    /// Whether a caller may retry without changing anything.
    pub fn default_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::RateLimit)
    }
}

/// A failed call, carried as data inside the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,

    /// Human-oriented description. The agent loop translates this into
    /// natural language; it is never shown to the end user verbatim.
    pub message: String,

    /// Whether retrying the identical call may succeed.
    pub retryable: bool,

    /// Whether the tool must be idempotent for a retry to be safe.
    #[serde(default)]
    pub needs_idempotency: bool,

    /// Whether the handler may have applied partial side effects before
    /// failing.
    #[serde(default)]
    pub partial_side_effects: bool,

    /// Machine-readable extras (e.g. a confirmation token + preview).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ToolFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.default_retryable(),
            needs_idempotency: false,
            partial_side_effects: false,
            detail: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn session_inactive(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionInactive, message)
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_partial_side_effects(mut self, partial: bool) -> Self {
        self.partial_side_effects = partial;
        self
    }

    pub fn with_needs_idempotency(mut self, needs: bool) -> Self {
        self.needs_idempotency = needs;
        self
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Timing and provenance metadata attached to every envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// Wall-clock time the call spent in dispatch, including the handler.
    pub duration_ms: u64,

    /// Set when an earlier call with near-identical arguments exists in
    /// the session's tool memory; the caller may reuse that result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundant_with: Option<String>,
}

/// The uniform success/failure wrapper for one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Success discriminant.
    pub ok: bool,

    /// Present iff `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Present iff `!ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,

    /// Declarative state mutations, applied by the state controller —
    /// never self-applied by the handler that produced them.
    #[serde(default)]
    pub intents: Vec<Intent>,

    #[serde(default)]
    pub meta: EnvelopeMeta,
}

impl Envelope {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            intents: Vec::new(),
            meta: EnvelopeMeta::default(),
        }
    }

    pub fn failure(error: ToolFailure) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
            intents: Vec::new(),
            meta: EnvelopeMeta::default(),
        }
    }

    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.meta.duration_ms = duration_ms;
        self
    }
}
