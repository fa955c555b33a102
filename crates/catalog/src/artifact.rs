//! The registry artifact — the sole runtime source of tool contracts.
//!
//! Produced by a separate build step; the core loads it once at startup
//! and never consults anything else for tool shapes. Failures here are
//! operator-facing [`Error::Registry`] values, not envelope data.

use crate::descriptor::ToolDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use switchboard_core::Error;
use tracing::info;

/// The versioned registry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryArtifact {
    /// Registry document version.
    pub version: String,

    /// Source-control revision the artifact was built from.
    #[serde(default)]
    pub source_revision: String,

    /// Build timestamp.
    pub built_at: DateTime<Utc>,

    /// Registry-wide content hash over all descriptor schemas and docs.
    /// Empty means "unhashed" (hand-written artifacts in tests).
    #[serde(default)]
    pub content_hash: String,

    pub tools: Vec<ToolDescriptor>,
}

impl RegistryArtifact {
    /// Parse an artifact from its JSON document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let artifact: Self = serde_json::from_str(json)
            .map_err(|e| Error::registry(format!("malformed registry artifact: {e}")))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::registry(format!("cannot read registry artifact at {}: {e}", path.display()))
        })?;
        let artifact = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            version = %artifact.version,
            tools = artifact.tools.len(),
            "Registry artifact loaded"
        );
        Ok(artifact)
    }

    /// Check descriptors are well-formed, ids are unique, and the declared
    /// content hash (when present) matches the descriptors.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for tool in &self.tools {
            tool.validate()?;
            if !seen.insert(tool.id.as_str()) {
                return Err(Error::registry(format!("duplicate tool id '{}'", tool.id)));
            }
        }

        if !self.content_hash.is_empty() {
            let computed = compute_content_hash(&self.tools);
            if computed != self.content_hash {
                return Err(Error::registry(format!(
                    "registry content hash mismatch (declared {}, computed {computed})",
                    self.content_hash
                )));
            }
        }
        Ok(())
    }
}

/// Hash all descriptor content fragments, sorted by id so descriptor order
/// in the document does not affect the hash.
pub fn compute_content_hash(tools: &[ToolDescriptor]) -> String {
    let mut fragments: Vec<String> = tools.iter().map(|t| t.content_fragment()).collect();
    fragments.sort();

    let mut hasher = Sha256::new();
    for fragment in &fragments {
        hasher.update(fragment.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact_json(tools: serde_json::Value) -> String {
        json!({
            "version": "2026-08-01",
            "source_revision": "deadbeef",
            "built_at": "2026-08-01T00:00:00Z",
            "tools": tools
        })
        .to_string()
    }

    fn tool(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "version": "1.0.0",
            "category": "utility",
            "side_effect": "none",
            "allowed_modes": ["text"],
            "latency_budget_ms": 100,
            "parameters": { "properties": {}, "required": [] }
        })
    }

    #[test]
    fn parses_a_minimal_artifact() {
        let artifact = RegistryArtifact::from_json(&artifact_json(json!([tool("calc")]))).unwrap();
        assert_eq!(artifact.version, "2026-08-01");
        assert_eq!(artifact.tools.len(), 1);
        assert!(artifact.content_hash.is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err =
            RegistryArtifact::from_json(&artifact_json(json!([tool("calc"), tool("calc")])))
                .unwrap_err();
        assert!(err.to_string().contains("duplicate tool id"));
    }

    #[test]
    fn malformed_json_is_a_registry_error() {
        let err = RegistryArtifact::from_json("{").unwrap_err();
        assert!(err.to_string().contains("Registry error"));
    }

    #[test]
    fn content_hash_is_order_independent() {
        let a = RegistryArtifact::from_json(&artifact_json(json!([tool("a"), tool("b")]))).unwrap();
        let b = RegistryArtifact::from_json(&artifact_json(json!([tool("b"), tool("a")]))).unwrap();
        assert_eq!(compute_content_hash(&a.tools), compute_content_hash(&b.tools));
    }

    #[test]
    fn declared_hash_must_match() {
        let good = RegistryArtifact::from_json(&artifact_json(json!([tool("a")]))).unwrap();
        let real_hash = compute_content_hash(&good.tools);

        let mut doc: serde_json::Value =
            serde_json::from_str(&artifact_json(json!([tool("a")]))).unwrap();
        doc["content_hash"] = json!(real_hash);
        assert!(RegistryArtifact::from_json(&doc.to_string()).is_ok());

        doc["content_hash"] = json!("0000");
        let err = RegistryArtifact::from_json(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn load_missing_file_is_operator_facing() {
        let err = RegistryArtifact::load(Path::new("/nonexistent/registry.json")).unwrap_err();
        assert!(matches!(err, Error::Registry { .. }));
    }
}
