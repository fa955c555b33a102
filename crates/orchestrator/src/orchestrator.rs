//! The per-turn orchestration pipeline.

use crate::controller::StateController;
use crate::request::DispatchRequest;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchboard_catalog::ToolCatalog;
use switchboard_config::OrchestratorConfig;
use switchboard_context::{AssembledContext, ContextManager, ConversationTurn};
use switchboard_core::{
    CallContext, DomainEvent, Envelope, EventBus, SessionId, SessionMode, ToolFailure,
};
use switchboard_loopguard::{LoopGuard, LoopVerdict};
use switchboard_memory::{RecordPayload, ToolCallRecord, ToolMemory};
use switchboard_policy::{Denial, PolicyDecision, PolicyEnforcer};
use tracing::{debug, info};
use uuid::Uuid;

/// Runs every tool-call request through the full pipeline:
/// policy → loop pre-check → catalog dispatch → loop record → memory
/// record → intent application. Also owns the turn/session lifecycle and
/// the context manager consulted before each model call.
///
/// Distinct sessions run concurrently; within one session the caller
/// serializes calls per turn.
pub struct Orchestrator {
    catalog: Arc<ToolCatalog>,
    policy: PolicyEnforcer,
    loops: LoopGuard,
    memory: ToolMemory,
    context: ContextManager,
    controller: StateController,
    events: Arc<EventBus>,
    turns: Mutex<HashMap<SessionId, u64>>,
    redundancy_threshold: f64,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, catalog: Arc<ToolCatalog>) -> Self {
        Self {
            catalog,
            policy: PolicyEnforcer::new(config.policy.clone()),
            loops: LoopGuard::new(config.loops.clone()),
            memory: ToolMemory::new(config.tool_memory.clone()),
            context: ContextManager::new(config.context.clone()),
            controller: StateController::new(),
            events: Arc::new(EventBus::default()),
            turns: Mutex::new(HashMap::new()),
            redundancy_threshold: config.tool_memory.similarity_threshold,
        }
    }

    /// Replace the default event bus, e.g. to share one with a gateway.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Replace the default context manager, e.g. to plug in an LLM-backed
    /// summarizer.
    pub fn with_context_manager(mut self, context: ContextManager) -> Self {
        self.context = context;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// The tool memory store, for host-side queries.
    pub fn memory(&self) -> &ToolMemory {
        &self.memory
    }

    // ── Session lifecycle ─────────────────────────────────────────────

    /// Open a new session in the given mode. Turn numbering starts at 1.
    pub fn open_session(&self, mode: SessionMode) -> SessionId {
        let session_id = SessionId::new();
        self.controller.open(&session_id, mode);
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.clone(), 1);
        info!(session = %session_id, %mode, "Session opened");
        session_id
    }

    /// Advance to the next turn: quota counters reset, loop history is
    /// pruned, and a parked end-of-session takes effect. Returns the new
    /// turn number, or `None` once the session has ended.
    pub async fn begin_turn(&self, session_id: &SessionId) -> Option<u64> {
        if self.controller.snapshot(session_id)?.active && self.controller.has_pending_end(session_id)
        {
            debug!(session = %session_id, "Parked end-of-session taking effect at turn boundary");
            self.end_session(session_id).await;
            return None;
        }
        if !self.controller.snapshot(session_id)?.active {
            return None;
        }

        let turn = {
            let mut turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
            let entry = turns.entry(session_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.policy.advance_turn(session_id, turn);
        self.loops.advance_turn(session_id, turn);
        Some(turn)
    }

    /// End a session now. Per-session state in every component is dropped;
    /// the (inactive) session state itself is kept so late envelopes are
    /// recognizably dead rather than unknown.
    pub async fn end_session(&self, session_id: &SessionId) {
        self.controller.deactivate(session_id);
        self.policy.end_session(session_id);
        self.loops.end_session(session_id);
        self.memory.end_session(session_id).await;
        self.context.end_session(session_id).await;
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        self.events.publish(DomainEvent::SessionEnded {
            session_id: session_id.clone(),
            timestamp: Utc::now(),
        });
        info!(session = %session_id, "Session ended");
    }

    // ── Dispatch ──────────────────────────────────────────────────────

    /// Run one tool call through the pipeline. Every rejection stage
    /// returns the same envelope shape.
    pub async fn dispatch(&self, request: DispatchRequest) -> Envelope {
        let session_id = request.session_id.clone();
        let Some(state) = self.controller.snapshot(&session_id).filter(|s| s.active) else {
            return Envelope::failure(ToolFailure::session_inactive(format!(
                "session '{session_id}' is not active"
            )));
        };
        let turn = self.current_turn(&session_id);

        let ctx = CallContext {
            call_id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            mode: request.mode,
            capabilities: request.capabilities.clone(),
            arguments: serde_json::Value::Null,
            state,
        };
        let call_id = ctx.call_id.clone();

        // Unknown tools take the catalog's validation path directly so the
        // envelope shape matches every other rejection.
        let Some(descriptor) = self.catalog.describe(&request.tool_id) else {
            return self
                .catalog
                .dispatch(&request.tool_id, request.arguments, ctx)
                .await;
        };
        let latency_budget_ms = descriptor.latency_budget_ms;

        match self.policy.authorize(
            &session_id,
            turn,
            descriptor,
            request.mode,
            &request.arguments,
            request.confirmation_token.as_deref(),
        ) {
            PolicyDecision::Allow => {}
            PolicyDecision::Deny(denial) => {
                self.events.publish(DomainEvent::PolicyDenied {
                    session_id: session_id.clone(),
                    tool_id: request.tool_id.clone(),
                    reason: denial_reason(&denial).to_string(),
                    timestamp: Utc::now(),
                });
                return Envelope::failure(denial.into_failure());
            }
        }

        let verdict = self.loops.check(&session_id, turn, &request.tool_id, &request.arguments);
        if let LoopVerdict::Detected { kind, count, .. } = &verdict {
            self.events.publish(DomainEvent::LoopRefused {
                session_id: session_id.clone(),
                tool_id: request.tool_id.clone(),
                kind: kind.as_str().to_string(),
                count: *count,
                timestamp: Utc::now(),
            });
        }
        if let Some(failure) = verdict.into_failure() {
            return Envelope::failure(failure);
        }

        // Look for a redundant prior call before this one is recorded, so
        // a call can never be redundant with itself.
        let similar = self
            .memory
            .find_similar(
                &session_id,
                &request.tool_id,
                &request.arguments,
                self.redundancy_threshold,
            )
            .await;

        let mut envelope = self
            .catalog
            .dispatch(&request.tool_id, request.arguments.clone(), ctx)
            .await;

        // The session may have ended while the handler was in flight; a
        // dead session's envelope is discarded, intents void.
        let Some(updated) = self.controller.apply(&session_id, &envelope.intents) else {
            debug!(session = %session_id, tool = %request.tool_id, "Discarding envelope for ended session");
            return Envelope::failure(ToolFailure::session_inactive(format!(
                "session '{session_id}' ended while '{}' was in flight",
                request.tool_id
            )))
            .with_duration(envelope.meta.duration_ms);
        };

        self.loops
            .record(&session_id, turn, &request.tool_id, &request.arguments, &envelope);

        // A failed call has no reusable result, so only successes carry
        // the redundancy hint.
        if envelope.ok {
            if let Some(similar) = similar {
                envelope.meta.redundant_with = Some(similar.call_id);
            }
        }

        let payload = if envelope.ok {
            RecordPayload::Full {
                data: envelope.data.clone().unwrap_or(serde_json::Value::Null),
            }
        } else {
            let message = envelope
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "failed".to_string());
            RecordPayload::Summary { text: message }
        };
        self.memory
            .record(
                &session_id,
                ToolCallRecord {
                    call_id,
                    tool_id: request.tool_id.clone(),
                    arguments: request.arguments,
                    timestamp: Utc::now(),
                    turn,
                    success: envelope.ok,
                    payload,
                },
            )
            .await;

        self.events.publish(DomainEvent::ToolDispatched {
            session_id: session_id.clone(),
            tool_id: request.tool_id.clone(),
            ok: envelope.ok,
            duration_ms: envelope.meta.duration_ms,
            timestamp: Utc::now(),
        });
        if envelope.meta.duration_ms > latency_budget_ms {
            self.events.publish(DomainEvent::LatencyBudgetExceeded {
                tool_id: request.tool_id.clone(),
                budget_ms: latency_budget_ms,
                actual_ms: envelope.meta.duration_ms,
                timestamp: Utc::now(),
            });
        }

        // An immediate end-of-session intent just took effect.
        if !updated.active {
            self.end_session(&session_id).await;
        }

        envelope
    }

    // ── Conversation context ──────────────────────────────────────────

    /// Append a conversation turn to a session's dialogue.
    pub async fn push_turn(&self, session_id: &SessionId, turn: ConversationTurn) {
        self.context.push_turn(session_id, turn).await;
    }

    /// Assemble the context payload for the next model call. `None` when
    /// the session does not exist.
    pub async fn assemble_context(&self, session_id: &SessionId) -> Option<AssembledContext> {
        let state = self.controller.snapshot(session_id)?;
        let outcome = self.context.assemble_outcome(session_id, &state).await;
        self.events.publish(DomainEvent::ContextAssembled {
            session_id: session_id.clone(),
            raw_messages: outcome.payload.messages.len(),
            summarized: outcome.payload.summary.is_some(),
            estimated_tokens: outcome.payload.estimated_tokens,
            cache_hit: outcome.cache_hit,
            timestamp: Utc::now(),
        });
        Some(outcome.payload)
    }

    /// Read-only snapshot of a session's state.
    pub fn session_state(&self, session_id: &SessionId) -> Option<switchboard_core::SessionState> {
        self.controller.snapshot(session_id)
    }

    fn current_turn(&self, session_id: &SessionId) -> u64 {
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .copied()
            .unwrap_or(1)
    }
}

fn denial_reason(denial: &Denial) -> &'static str {
    match denial {
        Denial::ModeRestricted { .. } => "mode_restricted",
        Denial::BudgetExceeded { .. } => "budget_exceeded",
        Denial::ConfirmationRequired { .. } => "confirmation_required",
    }
}
