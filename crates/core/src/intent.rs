//! Declarative session-state mutations returned by tool handlers.
//!
//! Handlers never touch session state directly. They return intents inside
//! their envelope, and the orchestrator's state controller applies them —
//! exactly once, in envelope order. That keeps the single-writer invariant
//! cheap: there is one mutation path, and it is not inside handler code.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// When an end-of-session intent takes effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndTiming {
    /// Tear the session down right away.
    Immediate,
    /// Let the current turn finish, then end.
    #[default]
    AfterTurn,
}

/// The closed vocabulary of session-state mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// Request the session to end.
    EndSession {
        #[serde(default)]
        timing: EndTiming,
    },
    /// Suppress (or restore) audio playback for this session.
    SuppressAudio {
        #[serde(default)]
        on: bool,
    },
    /// Suppress (or restore) transcript emission for this session.
    SuppressTranscript {
        #[serde(default)]
        on: bool,
    },
    /// Queue a message to be injected into the conversation.
    SetPendingMessage {
        #[serde(default)]
        text: String,
    },
}

impl Intent {
    /// Decode an intent from loosely-shaped JSON.
    ///
    /// Handlers assembled from external tool definitions sometimes emit
    /// intents with missing fields. Those are tolerated: the field falls
    /// back to a safe default and a warning is logged. Only an unknown or
    /// missing `kind` makes decoding fail.
    pub fn from_value(value: &serde_json::Value) -> Option<Intent> {
        let kind = value.get("kind").and_then(|k| k.as_str())?;
        match kind {
            "end_session" => {
                let timing = match value.get("timing") {
                    Some(t) => serde_json::from_value(t.clone()).unwrap_or_else(|_| {
                        warn!(raw = %t, "Unrecognized end_session timing, defaulting to after_turn");
                        EndTiming::AfterTurn
                    }),
                    None => {
                        warn!("end_session intent missing 'timing', defaulting to after_turn");
                        EndTiming::AfterTurn
                    }
                };
                Some(Intent::EndSession { timing })
            }
            "suppress_audio" => Some(Intent::SuppressAudio {
                on: Self::bool_field(value, "on", "suppress_audio"),
            }),
            "suppress_transcript" => Some(Intent::SuppressTranscript {
                on: Self::bool_field(value, "on", "suppress_transcript"),
            }),
            "set_pending_message" => {
                let text = match value.get("text").and_then(|t| t.as_str()) {
                    Some(t) => t.to_string(),
                    None => {
                        warn!("set_pending_message intent missing 'text', defaulting to empty");
                        String::new()
                    }
                };
                Some(Intent::SetPendingMessage { text })
            }
            other => {
                warn!(kind = other, "Ignoring intent with unknown kind");
                None
            }
        }
    }

    fn bool_field(value: &serde_json::Value, field: &str, kind: &str) -> bool {
        match value.get(field).and_then(|v| v.as_bool()) {
            Some(b) => b,
            None => {
                warn!(kind, field, "Intent missing boolean field, defaulting to true");
                true
            }
        }
    }
}
