//! Turn-scoped loop detection.
//!
//! Watches (tool, arguments, result) tuples within a turn and refuses a
//! call once a repetition pattern crosses its threshold. A refusal is a
//! human-readable message meant to be relayed verbatim to the calling
//! agent — never an exception, and never something that blocks a future
//! turn.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use switchboard_core::canonical::canonical_string;
use switchboard_core::{Envelope, ErrorKind, SessionId, ToolFailure};
use switchboard_config::LoopConfig;
use tracing::debug;

/// The two repetition patterns we refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopKind {
    SameCallRepeated,
    EmptyResultsRepeated,
}

impl LoopKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopKind::SameCallRepeated => "SAME_CALL_REPEATED",
            LoopKind::EmptyResultsRepeated => "EMPTY_RESULTS_REPEATED",
        }
    }
}

/// Outcome of the pre-dispatch check.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopVerdict {
    Clear,
    Detected {
        kind: LoopKind,
        count: u32,
        /// Relayed to the calling agent as-is.
        message: String,
    },
}

impl LoopVerdict {
    /// Convert a detection into the uniform envelope failure shape.
    /// Calling this on `Clear` is a programming error, hence the Option.
    pub fn into_failure(self) -> Option<ToolFailure> {
        match self {
            LoopVerdict::Clear => None,
            LoopVerdict::Detected { message, kind, count } => Some(
                ToolFailure::new(ErrorKind::LoopDetected, message).with_detail(serde_json::json!({
                    "kind": kind,
                    "count": count,
                })),
            ),
        }
    }
}

#[derive(Debug, Clone)]
struct CallSignature {
    tool_id: String,
    arg_hash: String,
    empty_result: bool,
}

#[derive(Debug, Default)]
struct TurnHistory {
    turn: u64,
    calls: Vec<CallSignature>,
}

/// Observes calls per (session, turn) and refuses repetition.
///
/// History keeps at most `retained_turns` turns per session, pruned on
/// each new-turn boundary; sessions never see each other's history.
pub struct LoopGuard {
    config: LoopConfig,
    history: Mutex<HashMap<SessionId, VecDeque<TurnHistory>>>,
}

impl LoopGuard {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Pre-dispatch check. Looks only at calls already observed this turn.
    pub fn check(
        &self,
        session_id: &SessionId,
        turn: u64,
        tool_id: &str,
        args: &serde_json::Value,
    ) -> LoopVerdict {
        let arg_hash = hash_args(args);
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let Some(calls) = current_turn_calls(&history, session_id, turn) else {
            return LoopVerdict::Clear;
        };

        let identical = calls
            .iter()
            .filter(|c| c.tool_id == tool_id && c.arg_hash == arg_hash)
            .count() as u32;
        if identical >= self.config.same_call_threshold {
            let count = identical + 1;
            debug!(tool = tool_id, count, "Refusing repeated identical call");
            return LoopVerdict::Detected {
                kind: LoopKind::SameCallRepeated,
                count,
                message: format!(
                    "You have already called '{tool_id}' with these exact arguments {identical} times \
                     this turn and attempt {count} was stopped. Repeating the call will not change \
                     the result — try different arguments or a different approach."
                ),
            };
        }

        let empties = calls
            .iter()
            .filter(|c| c.tool_id == tool_id && c.empty_result)
            .count() as u32;
        if empties >= self.config.empty_results_threshold {
            debug!(tool = tool_id, empties, "Refusing call after repeated empty results");
            return LoopVerdict::Detected {
                kind: LoopKind::EmptyResultsRepeated,
                count: empties,
                message: format!(
                    "'{tool_id}' has returned no results {empties} times in a row this turn. \
                     Further calls are unlikely to find anything — tell the user what you tried \
                     or take a different approach."
                ),
            };
        }

        LoopVerdict::Clear
    }

    /// Post-dispatch record. Every dispatched call is recorded; only
    /// successful-but-empty envelopes count toward the empty-results
    /// pattern (an error is never an empty success).
    pub fn record(
        &self,
        session_id: &SessionId,
        turn: u64,
        tool_id: &str,
        args: &serde_json::Value,
        envelope: &Envelope,
    ) {
        let signature = CallSignature {
            tool_id: tool_id.to_string(),
            arg_hash: hash_args(args),
            empty_result: envelope.ok && is_empty_payload(envelope.data.as_ref()),
        };

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let turns = history.entry(session_id.clone()).or_default();
        match turns.back_mut() {
            Some(current) if current.turn == turn => current.calls.push(signature),
            _ => {
                turns.push_back(TurnHistory { turn, calls: vec![signature] });
                while turns.len() > self.config.retained_turns {
                    turns.pop_front();
                }
            }
        }
    }

    /// New-turn boundary: start a fresh turn record and prune old ones.
    pub fn advance_turn(&self, session_id: &SessionId, turn: u64) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let turns = history.entry(session_id.clone()).or_default();
        if turns.back().map(|t| t.turn) != Some(turn) {
            turns.push_back(TurnHistory { turn, calls: Vec::new() });
        }
        while turns.len() > self.config.retained_turns {
            turns.pop_front();
        }
    }

    /// Drop all history for an ended session.
    pub fn end_session(&self, session_id: &SessionId) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
    }
}

fn current_turn_calls<'a>(
    history: &'a HashMap<SessionId, VecDeque<TurnHistory>>,
    session_id: &SessionId,
    turn: u64,
) -> Option<&'a [CallSignature]> {
    history
        .get(session_id)?
        .iter()
        .rev()
        .find(|t| t.turn == turn)
        .map(|t| t.calls.as_slice())
}

/// Hash arguments order-independently: identical argument objects hash the
/// same regardless of key order.
fn hash_args(args: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(args).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Structurally empty success payload: nothing, an empty collection or
/// string, or an explicit empty `results` field.
fn is_empty_payload(data: Option<&serde_json::Value>) -> bool {
    let Some(data) = data else { return true };
    match data {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => {
            if o.is_empty() {
                return true;
            }
            match o.get("results") {
                Some(serde_json::Value::Array(a)) => a.is_empty(),
                Some(serde_json::Value::String(s)) => s.is_empty(),
                _ => false,
            }
        }
        _ => false,
    }
}
