//! The session-scoped tool memory store.

use crate::record::{MemoryQuery, RecordPayload, RecordSummary, ToolCallRecord};
use crate::similarity::argument_similarity;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::collections::VecDeque;
use switchboard_config::ToolMemoryConfig;
use switchboard_core::SessionId;
use tokio::sync::RwLock;
use tracing::debug;

/// A prior call whose arguments closely match a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarCall {
    pub call_id: String,
    pub score: f64,
}

/// Stores recent tool calls per session with a recency window.
///
/// Newest records keep their full response payload; records pushed past
/// `full_window` are demoted to one-line summaries; records past
/// `max_records` or `max_age_secs` are dropped. The window is re-applied
/// on every mutation, so the store never holds more full payloads than
/// configured regardless of call rate.
pub struct ToolMemory {
    config: ToolMemoryConfig,
    sessions: RwLock<HashMap<SessionId, VecDeque<ToolCallRecord>>>,
}

impl ToolMemory {
    pub fn new(config: ToolMemoryConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Record one dispatched call. Records arrive newest-last.
    pub async fn record(&self, session_id: &SessionId, record: ToolCallRecord) {
        let mut sessions = self.sessions.write().await;
        let records = sessions.entry(session_id.clone()).or_default();
        records.push_back(record);
        self.apply_window(records);
    }

    /// Query the session's records, newest first, as summaries.
    pub async fn query(&self, session_id: &SessionId, query: &MemoryQuery) -> Vec<RecordSummary> {
        let sessions = self.sessions.read().await;
        let Some(records) = sessions.get(session_id) else {
            return Vec::new();
        };
        records
            .iter()
            .rev()
            .filter(|r| query.include_errors || r.success)
            .filter(|r| query.tool_id.as_deref().is_none_or(|t| r.tool_id == t))
            .filter(|r| query.since.is_none_or(|s| r.timestamp >= s))
            .filter(|r| query.until.is_none_or(|u| r.timestamp <= u))
            .map(|r| RecordSummary {
                call_id: r.call_id.clone(),
                tool_id: r.tool_id.clone(),
                timestamp: r.timestamp,
                turn: r.turn,
                success: r.success,
                summary: r.summary_text(),
            })
            .collect()
    }

    /// Full payload of one recorded call, if it is still inside the full
    /// window. Summarized and dropped records return `None`.
    pub async fn get_full_response(
        &self,
        session_id: &SessionId,
        call_id: &str,
    ) -> Option<serde_json::Value> {
        let sessions = self.sessions.read().await;
        let records = sessions.get(session_id)?;
        records.iter().find(|r| r.call_id == call_id).and_then(|r| {
            match &r.payload {
                RecordPayload::Full { data } => Some(data.clone()),
                RecordPayload::Summary { .. } => None,
            }
        })
    }

    /// Most similar prior successful call to the same tool, if any scores
    /// at or above `threshold`. Exact argument matches score 1.0, so a
    /// threshold of 1.0 restricts the search to identical calls.
    pub async fn find_similar(
        &self,
        session_id: &SessionId,
        tool_id: &str,
        arguments: &serde_json::Value,
        threshold: f64,
    ) -> Option<SimilarCall> {
        let sessions = self.sessions.read().await;
        let records = sessions.get(session_id)?;
        records
            .iter()
            .rev()
            .filter(|r| r.success && r.tool_id == tool_id)
            .map(|r| SimilarCall {
                call_id: r.call_id.clone(),
                score: argument_similarity(&r.arguments, arguments),
            })
            .filter(|c| c.score >= threshold)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Drop everything held for a session.
    pub async fn end_session(&self, session_id: &SessionId) {
        if self.sessions.write().await.remove(session_id).is_some() {
            debug!(session = %session_id, "Dropped tool memory for ended session");
        }
    }

    /// Re-apply the recency window: age out, cap the count, demote
    /// everything past the full window. Records are stored oldest-first.
    fn apply_window(&self, records: &mut VecDeque<ToolCallRecord>) {
        let cutoff = Utc::now() - Duration::seconds(self.config.max_age_secs as i64);
        while records.front().is_some_and(|r| r.timestamp < cutoff) {
            records.pop_front();
        }
        while records.len() > self.config.max_records {
            records.pop_front();
        }
        let full_from = records.len().saturating_sub(self.config.full_window);
        for record in records.iter_mut().take(full_from) {
            record.demote();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordPayload;
    use serde_json::json;

    fn record(call_id: &str, tool_id: &str, args: serde_json::Value, turn: u64) -> ToolCallRecord {
        ToolCallRecord {
            call_id: call_id.into(),
            tool_id: tool_id.into(),
            arguments: args,
            timestamp: Utc::now(),
            turn,
            success: true,
            payload: RecordPayload::Full { data: json!({"results": ["hit"]}) },
        }
    }

    fn small_config() -> ToolMemoryConfig {
        ToolMemoryConfig {
            full_window: 2,
            max_records: 4,
            ..ToolMemoryConfig::default()
        }
    }

    #[tokio::test]
    async fn records_past_full_window_are_demoted() {
        let memory = ToolMemory::new(small_config());
        let session = SessionId::new();
        for i in 0..3 {
            memory
                .record(&session, record(&format!("c{i}"), "search", json!({"q": i}), 1))
                .await;
        }

        // Newest two keep full payloads, oldest is summarized.
        assert!(memory.get_full_response(&session, "c2").await.is_some());
        assert!(memory.get_full_response(&session, "c1").await.is_some());
        assert!(memory.get_full_response(&session, "c0").await.is_none());

        // The summarized record is still queryable.
        let summaries = memory.query(&session, &MemoryQuery::default()).await;
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[2].call_id, "c0");
        assert!(summaries[2].summary.contains("1 results"));
    }

    #[tokio::test]
    async fn records_past_max_records_are_dropped() {
        let memory = ToolMemory::new(small_config());
        let session = SessionId::new();
        for i in 0..6 {
            memory
                .record(&session, record(&format!("c{i}"), "search", json!({"q": i}), 1))
                .await;
        }
        let summaries = memory.query(&session, &MemoryQuery::default()).await;
        assert_eq!(summaries.len(), 4);
        // Newest first.
        assert_eq!(summaries[0].call_id, "c5");
        assert_eq!(summaries[3].call_id, "c2");
    }

    #[tokio::test]
    async fn default_window_over_sixty_records() {
        let config = ToolMemoryConfig::default();
        let memory = ToolMemory::new(config.clone());
        let session = SessionId::new();
        for i in 0..60 {
            memory
                .record(&session, record(&format!("c{i}"), "search", json!({"q": i}), 1))
                .await;
        }

        let summaries = memory.query(&session, &MemoryQuery::default()).await;
        assert_eq!(summaries.len(), config.max_records);
        // Oldest ten dropped entirely.
        assert_eq!(summaries.last().map(|s| s.call_id.as_str()), Some("c10"));

        // Newest ten keep full payloads, the forty behind them do not.
        for i in 50..60 {
            assert!(memory.get_full_response(&session, &format!("c{i}")).await.is_some());
        }
        for i in 10..50 {
            assert!(memory.get_full_response(&session, &format!("c{i}")).await.is_none());
        }
    }

    #[tokio::test]
    async fn stale_records_age_out() {
        let memory = ToolMemory::new(ToolMemoryConfig {
            max_age_secs: 60,
            ..small_config()
        });
        let session = SessionId::new();
        let mut old = record("old", "search", json!({"q": "a"}), 1);
        old.timestamp = Utc::now() - Duration::seconds(120);
        memory.record(&session, old).await;
        memory.record(&session, record("new", "search", json!({"q": "b"}), 2)).await;

        let summaries = memory.query(&session, &MemoryQuery::default()).await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].call_id, "new");
    }

    #[tokio::test]
    async fn query_filters_compose() {
        let memory = ToolMemory::new(ToolMemoryConfig::default());
        let session = SessionId::new();
        memory.record(&session, record("c0", "search", json!({"q": "a"}), 1)).await;
        memory.record(&session, record("c1", "calendar", json!({"day": "mon"}), 1)).await;
        let mut failed = record("c2", "search", json!({"q": "b"}), 2);
        failed.success = false;
        memory.record(&session, failed).await;

        let by_tool = memory
            .query(&session, &MemoryQuery { tool_id: Some("search".into()), ..Default::default() })
            .await;
        assert_eq!(by_tool.len(), 1);
        assert_eq!(by_tool[0].call_id, "c0");

        let with_errors = memory
            .query(
                &session,
                &MemoryQuery {
                    tool_id: Some("search".into()),
                    include_errors: true,
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(with_errors.len(), 2);
    }

    #[tokio::test]
    async fn find_similar_reports_exact_and_near_matches() {
        let memory = ToolMemory::new(ToolMemoryConfig::default());
        let session = SessionId::new();
        memory
            .record(&session, record("c0", "search", json!({"query": "weather in oslo"}), 1))
            .await;

        let exact = memory
            .find_similar(&session, "search", &json!({"query": "weather in oslo"}), 0.8)
            .await
            .unwrap();
        assert_eq!(exact.call_id, "c0");
        assert_eq!(exact.score, 1.0);

        assert!(memory
            .find_similar(&session, "search", &json!({"query": "parser bug"}), 0.8)
            .await
            .is_none());
        // A different tool never matches.
        assert!(memory
            .find_similar(&session, "calendar", &json!({"query": "weather in oslo"}), 0.8)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn threshold_tunes_redundancy_sensitivity() {
        let memory = ToolMemory::new(ToolMemoryConfig::default());
        let session = SessionId::new();
        memory
            .record(&session, record("c0", "search", json!({"query": "weather in oslo"}), 1))
            .await;

        // Three of four tokens overlap: 0.75 overlap.
        let near = json!({"query": "weather in oslo today"});
        let hit = memory.find_similar(&session, "search", &near, 0.7).await.unwrap();
        assert_eq!(hit.call_id, "c0");
        assert!(memory.find_similar(&session, "search", &near, 0.8).await.is_none());

        // At 1.0 only an identical call qualifies.
        assert!(memory
            .find_similar(&session, "search", &json!({"query": "weather in oslo"}), 1.0)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn failed_calls_are_not_redundancy_candidates() {
        let memory = ToolMemory::new(ToolMemoryConfig::default());
        let session = SessionId::new();
        let mut failed = record("c0", "search", json!({"query": "weather"}), 1);
        failed.success = false;
        memory.record(&session, failed).await;

        assert!(memory
            .find_similar(&session, "search", &json!({"query": "weather"}), 0.8)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let memory = ToolMemory::new(ToolMemoryConfig::default());
        let a = SessionId::new();
        let b = SessionId::new();
        memory.record(&a, record("c0", "search", json!({"q": "x"}), 1)).await;

        assert!(memory.query(&b, &MemoryQuery::default()).await.is_empty());
        memory.end_session(&a).await;
        assert!(memory.query(&a, &MemoryQuery::default()).await.is_empty());
    }
}
