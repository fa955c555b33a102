//! Domain event system — decoupled observation of the orchestration core.
//!
//! Events are published when something interesting happens in a session.
//! A telemetry or gateway layer can subscribe to react without tight
//! coupling; publishing with no subscribers is free.

use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A tool call completed dispatch (successfully or not)
    ToolDispatched {
        session_id: SessionId,
        tool_id: String,
        ok: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A call was denied by policy before reaching the catalog
    PolicyDenied {
        session_id: SessionId,
        tool_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A call was refused by the loop detector
    LoopRefused {
        session_id: SessionId,
        tool_id: String,
        kind: String,
        count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A handler ran past its declared latency budget (soft violation)
    LatencyBudgetExceeded {
        tool_id: String,
        budget_ms: u64,
        actual_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A conversation payload was assembled for a model call
    ContextAssembled {
        session_id: SessionId,
        raw_messages: usize,
        summarized: bool,
        estimated_tokens: usize,
        cache_hit: bool,
        timestamp: DateTime<Utc>,
    },

    /// A session ended
    SessionEnded {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Components can
/// subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolDispatched {
            session_id: SessionId::from("s1"),
            tool_id: "web_search".into(),
            ok: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolDispatched { tool_id, ok, .. } => {
                assert_eq!(tool_id, "web_search");
                assert!(ok);
            }
            _ => panic!("Expected ToolDispatched event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::SessionEnded {
            session_id: SessionId::from("s1"),
            timestamp: Utc::now(),
        });
    }
}
