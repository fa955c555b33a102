//! Session state and the single mutation path into it.
//!
//! Created at session start, discarded at session end, never shared across
//! sessions. All mutation goes through [`SessionState::apply`] — handlers
//! only ever describe changes as [`Intent`]s.

use crate::intent::{EndTiming, Intent};
use crate::session::SessionMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Current interaction mode.
    pub mode: SessionMode,

    /// False once the session has ended; envelopes arriving afterwards are
    /// discarded rather than applied.
    pub active: bool,

    /// A requested end-of-session, if one is pending.
    pub pending_end: Option<EndTiming>,

    /// Audio playback suppressed for this session.
    pub suppress_audio: bool,

    /// Transcript emission suppressed for this session.
    pub suppress_transcript: bool,

    /// A message queued for injection into the conversation.
    pub pending_message: Option<String>,
}

impl SessionState {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            active: true,
            pending_end: None,
            suppress_audio: false,
            suppress_transcript: false,
            pending_message: None,
        }
    }

    /// Apply one intent. An immediate end deactivates the session on the
    /// spot; an after-turn end is parked in `pending_end` for the turn
    /// boundary to act on.
    pub fn apply(&mut self, intent: &Intent) {
        match intent {
            Intent::EndSession { timing } => {
                self.pending_end = Some(*timing);
                if *timing == EndTiming::Immediate {
                    self.active = false;
                }
            }
            Intent::SuppressAudio { on } => self.suppress_audio = *on,
            Intent::SuppressTranscript { on } => self.suppress_transcript = *on,
            Intent::SetPendingMessage { text } => {
                self.pending_message = Some(text.clone());
            }
        }
    }
}
