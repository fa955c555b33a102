//! Per-turn policy enforcement for Switchboard.
//!
//! Every tool call passes through [`PolicyEnforcer::authorize`] before the
//! catalog is touched. Three checks run in fixed order — mode restriction,
//! category quota, confirmation gate — and each produces a distinct denial
//! the caller must react to differently. Denials are expected outcomes,
//! not failures; they are logged at debug level only.

pub mod confirmation;

pub use confirmation::{ConfirmationToken, TokenError, TokenMinter};

use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use switchboard_catalog::ToolDescriptor;
use switchboard_config::PolicyConfig;
use switchboard_core::{ErrorKind, SessionId, SessionMode, ToolCategory, ToolFailure};
use tracing::debug;

/// The outcome of authorizing one call.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    Allow,
    Deny(Denial),
}

/// The three denial classes, in the order they are checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Denial {
    /// The tool does not allow the session's current mode.
    ModeRestricted { tool_id: String, mode: SessionMode },

    /// The per-turn ceiling for this category is exhausted until the next
    /// turn.
    BudgetExceeded { category: ToolCategory, ceiling: u32 },

    /// The call needs a confirmation token. Carries a freshly minted one
    /// plus a preview to show the user — this is a prompt, not a permanent
    /// failure.
    ConfirmationRequired { token: ConfirmationToken, preview: String },
}

impl Denial {
    /// Convert into the uniform envelope failure shape.
    pub fn into_failure(self) -> ToolFailure {
        match self {
            Denial::ModeRestricted { tool_id, mode } => ToolFailure::new(
                ErrorKind::ModeRestricted,
                format!("tool '{tool_id}' is not available in {mode} mode"),
            ),
            Denial::BudgetExceeded { category, ceiling } => ToolFailure::new(
                ErrorKind::BudgetExceeded,
                format!("per-turn limit of {ceiling} {category} calls reached; wait for the next turn"),
            ),
            Denial::ConfirmationRequired { token, preview } => ToolFailure::new(
                ErrorKind::ConfirmationRequired,
                format!("'{}' needs user confirmation before it can run", token.tool_id),
            )
            .with_detail(json!({
                "confirmation_token": token.token,
                "expires_at": token.expires_at,
                "preview": preview,
            })),
        }
    }
}

#[derive(Default)]
struct TurnCounters {
    turn: u64,
    counts: HashMap<ToolCategory, u32>,
}

/// Enforces per-turn/session rules ahead of dispatch.
///
/// Thread-safe; counters are keyed by session and reset at turn
/// boundaries, never mid-turn and never at session boundaries alone.
pub struct PolicyEnforcer {
    config: PolicyConfig,
    minter: TokenMinter,
    counters: Mutex<HashMap<SessionId, TurnCounters>>,
}

impl PolicyEnforcer {
    pub fn new(config: PolicyConfig) -> Self {
        let minter = TokenMinter::new(config.confirmation_ttl_secs);
        Self {
            config,
            minter,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Run the three checks in fixed order. On Allow, the call is counted
    /// against its category quota immediately, so a failing handler still
    /// consumes budget.
    pub fn authorize(
        &self,
        session_id: &SessionId,
        turn: u64,
        descriptor: &ToolDescriptor,
        mode: SessionMode,
        arguments: &serde_json::Value,
        confirmation: Option<&str>,
    ) -> PolicyDecision {
        // (a) Mode restriction.
        if !descriptor.allowed_modes.contains(&mode) {
            debug!(tool = %descriptor.id, %mode, "Denied: mode restricted");
            return PolicyDecision::Deny(Denial::ModeRestricted {
                tool_id: descriptor.id.clone(),
                mode,
            });
        }

        // (b) Category quota. Checked here to keep the fixed order, but
        // only committed once the confirmation gate also passes — a
        // confirmation prompt must not consume budget.
        let ceiling = self.ceiling(mode, descriptor.category);
        {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            let entry = counters.entry(session_id.clone()).or_default();
            if entry.turn != turn {
                entry.turn = turn;
                entry.counts.clear();
            }
            let used = entry.counts.get(&descriptor.category).copied().unwrap_or(0);
            if used >= ceiling {
                debug!(
                    tool = %descriptor.id,
                    category = %descriptor.category,
                    ceiling,
                    "Denied: per-turn budget exhausted"
                );
                return PolicyDecision::Deny(Denial::BudgetExceeded {
                    category: descriptor.category,
                    ceiling,
                });
            }
        }

        // (c) Confirmation gate.
        if descriptor.requires_confirmation {
            let valid = confirmation
                .map(|t| self.minter.verify(t, session_id.as_str(), &descriptor.id).is_ok())
                .unwrap_or(false);
            if !valid {
                let token = self.minter.mint(session_id.as_str(), &descriptor.id);
                let preview = preview_call(descriptor, arguments);
                debug!(tool = %descriptor.id, "Denied: confirmation required");
                return PolicyDecision::Deny(Denial::ConfirmationRequired { token, preview });
            }
        }

        {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            let entry = counters.entry(session_id.clone()).or_default();
            *entry.counts.entry(descriptor.category).or_insert(0) += 1;
        }

        PolicyDecision::Allow
    }

    /// Reset quota counters at a turn boundary.
    pub fn advance_turn(&self, session_id: &SessionId, turn: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let entry = counters.entry(session_id.clone()).or_default();
        entry.turn = turn;
        entry.counts.clear();
    }

    /// Drop all state for an ended session.
    pub fn end_session(&self, session_id: &SessionId) {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
    }

    fn ceiling(&self, mode: SessionMode, category: ToolCategory) -> u32 {
        let quotas = match mode {
            SessionMode::Text => &self.config.text_quotas,
            SessionMode::Voice => &self.config.voice_quotas,
        };
        match category {
            ToolCategory::Retrieval => quotas.retrieval,
            ToolCategory::Action => quotas.action,
            ToolCategory::Utility => quotas.utility,
        }
    }
}

/// A short human-readable description of the pending call, shown to the
/// user alongside the confirmation prompt.
fn preview_call(descriptor: &ToolDescriptor, arguments: &serde_json::Value) -> String {
    let doc = descriptor.docs.lines().next().unwrap_or_default();
    let args = serde_json::to_string(arguments).unwrap_or_else(|_| "{}".into());
    if doc.is_empty() {
        format!("{} with {args}", descriptor.id)
    } else {
        format!("{} ({doc}) with {args}", descriptor.id)
    }
}
