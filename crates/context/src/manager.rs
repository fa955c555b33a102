//! The per-session context manager.

use crate::summarizer::{ExtractiveSummarizer, Summarizer};
use crate::token;
use crate::turn::{AssembledContext, ConversationTurn};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_config::ContextConfig;
use switchboard_core::{SessionId, SessionState};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Marker appended to a summary trimmed for budget.
const ELLIPSIS: &str = " …";

#[derive(Debug, Default)]
struct SummaryState {
    text: String,
    /// Number of leading turns the summary covers. Monotone non-decreasing
    /// for the life of the session.
    coverage: usize,
}

struct CacheEntry {
    fingerprint: String,
    produced_at: DateTime<Utc>,
    payload: AssembledContext,
}

/// An assembled payload plus whether it was served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOutcome {
    pub payload: AssembledContext,
    pub cache_hit: bool,
}

#[derive(Default)]
struct SessionWindow {
    turns: Vec<ConversationTurn>,
    summary: Option<SummaryState>,
    cache: Option<CacheEntry>,
}

/// Maintains a token-bounded view of each session's dialogue.
///
/// The most recent `raw_tail` turns are always sent verbatim; everything
/// older is covered by one rolling summary, regenerated wholesale whenever
/// the tail advances past its coverage. Assembled payloads are cached by a
/// fingerprint of the earliest raw turns plus the mutable state flags, with
/// a short wall-clock TTL. Cache validity is checked lazily at assembly,
/// so any fingerprint change invalidates immediately.
pub struct ContextManager {
    config: ContextConfig,
    summarizer: Arc<dyn Summarizer>,
    sessions: RwLock<HashMap<SessionId, SessionWindow>>,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self::with_summarizer(config, Arc::new(ExtractiveSummarizer))
    }

    pub fn with_summarizer(config: ContextConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            config,
            summarizer,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append one turn to a session's dialogue.
    pub async fn push_turn(&self, session_id: &SessionId, turn: ConversationTurn) {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.clone()).or_default().turns.push(turn);
    }

    /// Number of turns currently held for a session.
    pub async fn turn_count(&self, session_id: &SessionId) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|w| w.turns.len()).unwrap_or(0)
    }

    /// Assemble the payload for the next model call.
    pub async fn assemble(
        &self,
        session_id: &SessionId,
        state: &SessionState,
    ) -> AssembledContext {
        self.assemble_outcome(session_id, state).await.payload
    }

    /// Like [`assemble`](Self::assemble), but also reports whether the
    /// payload came from the cache.
    pub async fn assemble_outcome(
        &self,
        session_id: &SessionId,
        state: &SessionState,
    ) -> AssemblyOutcome {
        let mut sessions = self.sessions.write().await;
        let window = sessions.entry(session_id.clone()).or_default();

        let split = window.turns.len().saturating_sub(self.config.raw_tail);
        let fingerprint = self.fingerprint(&window.turns[split..], state);

        if let Some(entry) = &window.cache {
            let fresh = Utc::now() - entry.produced_at
                <= Duration::seconds(self.config.cache_ttl_secs as i64);
            if entry.fingerprint == fingerprint && fresh {
                debug!(session = %session_id, "Context cache hit");
                return AssemblyOutcome {
                    payload: entry.payload.clone(),
                    cache_hit: true,
                };
            }
            window.cache = None;
        }

        // Regenerate the summary wholesale when the tail has advanced past
        // its coverage; reuse it otherwise. Coverage only ever grows.
        if split > 0 && window.summary.as_ref().is_none_or(|s| s.coverage < split) {
            match self.summarizer.summarize(&window.turns[..split]).await {
                Ok(text) => {
                    window.summary = Some(SummaryState { text, coverage: split });
                }
                Err(e) => {
                    warn!(session = %session_id, error = %e, "Summarization failed, proceeding without a fresh summary");
                }
            }
        }

        let mut summary = window
            .summary
            .as_ref()
            .filter(|_| split > 0)
            .map(|s| s.text.clone());
        let mut messages: Vec<ConversationTurn> = window.turns[split..].to_vec();

        // Budget enforcement: cap the summary first, then shed the oldest
        // raw turns until under the ceiling or a single message remains.
        let mut estimated = token::estimate_payload_tokens(summary.as_deref(), &messages);
        if estimated > self.config.token_ceiling {
            if let Some(text) = &summary {
                if let Some(capped) = cap_words(text, self.config.summary_word_cap) {
                    summary = Some(capped);
                    estimated = token::estimate_payload_tokens(summary.as_deref(), &messages);
                }
            }
        }
        while estimated > self.config.token_ceiling && messages.len() > 1 {
            messages.remove(0);
            estimated = token::estimate_payload_tokens(summary.as_deref(), &messages);
        }

        let payload = AssembledContext {
            summary,
            messages,
            estimated_tokens: estimated,
        };
        window.cache = Some(CacheEntry {
            fingerprint,
            produced_at: Utc::now(),
            payload: payload.clone(),
        });
        AssemblyOutcome {
            payload,
            cache_hit: false,
        }
    }

    /// Drop everything held for a session.
    pub async fn end_session(&self, session_id: &SessionId) {
        self.sessions.write().await.remove(session_id);
    }

    /// Cache key: the tail length, the earliest turns of the raw tail, and
    /// every mutable state flag. The length matters while the dialogue
    /// still fits inside the tail, where appending a turn leaves the
    /// earliest entries untouched.
    fn fingerprint(&self, raw_tail: &[ConversationTurn], state: &SessionState) -> String {
        let mut hasher = Sha256::new();
        hasher.update((raw_tail.len() as u64).to_be_bytes());
        for turn in raw_tail.iter().take(self.config.fingerprint_turns) {
            hasher.update(turn.speaker.to_string().as_bytes());
            hasher.update(b"\0");
            hasher.update(turn.text.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update([
            state.active as u8,
            state.pending_end.is_some() as u8,
            state.suppress_audio as u8,
            state.suppress_transcript as u8,
        ]);
        if let Some(pending) = &state.pending_message {
            hasher.update(pending.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Trim to `cap` words with an ellipsis marker. `None` when already within
/// the cap.
fn cap_words(text: &str, cap: usize) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= cap {
        return None;
    }
    Some(format!("{}{ELLIPSIS}", words[..cap].join(" ")))
}
