//! The single writer of session state.
//!
//! Handlers describe state changes as intents; only this controller ever
//! mutates a [`SessionState`], applying intents synchronously in envelope
//! order. That ordering is what keeps "session marked inactive" from racing
//! with a later step that assumed it was still active.

use std::collections::HashMap;
use std::sync::Mutex;
use switchboard_core::{Intent, SessionId, SessionMode, SessionState};
use tracing::debug;

pub struct StateController {
    states: Mutex<HashMap<SessionId, SessionState>>,
}

impl StateController {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Create state for a new session.
    pub fn open(&self, session_id: &SessionId, mode: SessionMode) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.clone(), SessionState::new(mode));
    }

    /// A read-only copy of a session's state, if the session exists.
    pub fn snapshot(&self, session_id: &SessionId) -> Option<SessionState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Apply intents in order. Returns the updated snapshot, or `None` when
    /// the session is gone or no longer active — intents from a dead
    /// session are void.
    pub fn apply(&self, session_id: &SessionId, intents: &[Intent]) -> Option<SessionState> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = states.get_mut(session_id)?;
        if !state.active {
            debug!(session = %session_id, "Discarding intents for inactive session");
            return None;
        }
        for intent in intents {
            state.apply(intent);
        }
        Some(state.clone())
    }

    /// Mark a session inactive in place. Returns false if it was already
    /// inactive or unknown.
    pub fn deactivate(&self, session_id: &SessionId) -> bool {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        match states.get_mut(session_id) {
            Some(state) if state.active => {
                state.active = false;
                true
            }
            _ => false,
        }
    }

    /// Whether the session has an end parked for the turn boundary.
    pub fn has_pending_end(&self, session_id: &SessionId) -> bool {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .is_some_and(|s| s.pending_end.is_some())
    }

    /// Drop a session's state entirely.
    pub fn remove(&self, session_id: &SessionId) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
    }
}

impl Default for StateController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::intent::EndTiming;

    #[test]
    fn intents_apply_in_order() {
        let controller = StateController::new();
        let session = SessionId::new();
        controller.open(&session, SessionMode::Text);

        let state = controller
            .apply(
                &session,
                &[
                    Intent::SetPendingMessage { text: "first".into() },
                    Intent::SetPendingMessage { text: "second".into() },
                    Intent::SuppressAudio { on: true },
                ],
            )
            .unwrap();
        assert_eq!(state.pending_message.as_deref(), Some("second"));
        assert!(state.suppress_audio);
    }

    #[test]
    fn dead_session_intents_are_void() {
        let controller = StateController::new();
        let session = SessionId::new();
        controller.open(&session, SessionMode::Text);
        controller.deactivate(&session);

        assert!(controller
            .apply(&session, &[Intent::SuppressAudio { on: true }])
            .is_none());
        // The flag never flipped.
        assert!(!controller.snapshot(&session).unwrap().suppress_audio);
    }

    #[test]
    fn immediate_end_deactivates_through_apply() {
        let controller = StateController::new();
        let session = SessionId::new();
        controller.open(&session, SessionMode::Voice);

        let state = controller
            .apply(&session, &[Intent::EndSession { timing: EndTiming::Immediate }])
            .unwrap();
        assert!(!state.active);
        // Later intents are now void.
        assert!(controller.apply(&session, &[]).is_none());
    }

    #[test]
    fn unknown_session_has_no_snapshot() {
        let controller = StateController::new();
        assert!(controller.snapshot(&SessionId::new()).is_none());
    }
}
