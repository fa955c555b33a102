//! Tool descriptors — the immutable contract of one callable capability.

use crate::schema::ParamSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchboard_core::{Error, SessionMode, SideEffectClass, ToolCategory};

/// Everything the core knows about a tool. Loaded from the registry
/// artifact; never constructed ad hoc at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Stable, globally unique id.
    pub id: String,

    /// Descriptor version (independent of the registry version).
    pub version: String,

    pub category: ToolCategory,

    pub side_effect: SideEffectClass,

    /// Whether repeating the call with identical arguments is safe.
    #[serde(default)]
    pub idempotent: bool,

    /// Whether dispatch requires a confirmation token.
    #[serde(default)]
    pub requires_confirmation: bool,

    /// Modes the tool may run in. Must be non-empty.
    pub allowed_modes: Vec<SessionMode>,

    /// Soft latency budget. Overruns are logged, never aborted.
    pub latency_budget_ms: u64,

    /// Structural argument schema. Undeclared properties are rejected.
    #[serde(default)]
    pub parameters: ParamSchema,

    /// Provider-specific schema projections, keyed by provider name.
    #[serde(default)]
    pub projections: BTreeMap<String, serde_json::Value>,

    /// Documentation shown to the model.
    #[serde(default)]
    pub docs: String,
}

impl ToolDescriptor {
    /// Check the descriptor is well-formed.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::registry("descriptor with empty id"));
        }
        if self.allowed_modes.is_empty() {
            return Err(Error::registry(format!(
                "tool '{}' declares no allowed modes",
                self.id
            )));
        }
        Ok(())
    }

    /// The canonical fragment of this descriptor that feeds the
    /// registry-wide content hash: id, version, schema, and docs.
    pub fn content_fragment(&self) -> String {
        let schema = serde_json::to_value(&self.parameters).unwrap_or_default();
        format!(
            "{}@{}:{}:{}",
            self.id,
            self.version,
            switchboard_core::canonical::canonical_string(&schema),
            self.docs
        )
    }
}
