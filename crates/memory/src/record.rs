//! Record shapes held by the tool memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the store still holds of a call's response.
///
/// Records start `Full` and are demoted to `Summary` as newer calls push
/// them out of the full-payload window. Demotion is one-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Full { data: serde_json::Value },
    Summary { text: String },
}

/// One recorded tool call within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_id: String,
    pub arguments: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub turn: u64,
    pub success: bool,
    pub payload: RecordPayload,
}

impl ToolCallRecord {
    /// Demote to summary form, dropping the full payload.
    pub(crate) fn demote(&mut self) {
        if let RecordPayload::Full { data } = &self.payload {
            self.payload = RecordPayload::Summary {
                text: summarize_payload(data),
            };
        }
    }

    pub(crate) fn summary_text(&self) -> String {
        match &self.payload {
            RecordPayload::Full { data } => summarize_payload(data),
            RecordPayload::Summary { text } => text.clone(),
        }
    }
}

/// The compact view returned by queries. Never carries a full payload;
/// callers go through `get_full_response` for that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub call_id: String,
    pub tool_id: String,
    pub timestamp: DateTime<Utc>,
    pub turn: u64,
    pub success: bool,
    pub summary: String,
}

/// Criteria for querying the store. All filters are conjunctive; a default
/// query matches every successful call in the session.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub tool_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_errors: bool,
}

/// One-line structural description of a response payload.
///
/// Deterministic and cheap: shape plus a short content hint, enough for
/// the agent to decide whether the full payload is worth re-fetching.
pub(crate) fn summarize_payload(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::Null => "empty response".to_string(),
        serde_json::Value::Bool(b) => format!("boolean {b}"),
        serde_json::Value::Number(n) => format!("number {n}"),
        serde_json::Value::String(s) => {
            if s.is_empty() {
                "empty string".to_string()
            } else {
                format!("text: {}", truncate_words(s, 12))
            }
        }
        serde_json::Value::Array(items) => {
            let hint = items
                .iter()
                .find_map(first_text)
                .map(|t| format!(", first: {}", truncate_words(&t, 8)))
                .unwrap_or_default();
            format!("{} items{hint}", items.len())
        }
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::Array(results)) = map.get("results") {
                let hint = results
                    .iter()
                    .find_map(first_text)
                    .map(|t| format!(", first: {}", truncate_words(&t, 8)))
                    .unwrap_or_default();
                return format!("{} results{hint}", results.len());
            }
            let keys: Vec<&str> = map.keys().take(5).map(String::as_str).collect();
            format!("object with fields: {}", keys.join(", "))
        }
    }
}

fn first_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map.values().find_map(first_text),
        serde_json::Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        words.join(" ")
    } else {
        format!("{}…", words[..max_words].join(" "))
    }
}
