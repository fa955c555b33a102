//! Session identity and the small closed vocabularies shared by every
//! component.
//!
//! Each orchestration component (policy, loop detection, tool memory,
//! context) keys its state by [`SessionId`]. Keeping the identifier opaque
//! and in one place means session isolation is enforced centrally rather
//! than re-implemented per component.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one running session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The interaction mode a session is currently in.
///
/// Voice mode carries tighter latency expectations, so tools declare which
/// modes they may run in and quotas are smaller for voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Text,
    Voice,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Text => write!(f, "text"),
            SessionMode::Voice => write!(f, "voice"),
        }
    }
}

/// The three tool categories, used for per-turn quota accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Read-only lookups against external data
    Retrieval,
    /// Stateful actions with observable side effects
    Action,
    /// Deterministic transforms with no external effects
    Utility,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolCategory::Retrieval => write!(f, "retrieval"),
            ToolCategory::Action => write!(f, "action"),
            ToolCategory::Utility => write!(f, "utility"),
        }
    }
}

/// What a tool does to the world, declared in its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectClass {
    None,
    ReadOnly,
    Writes,
}
