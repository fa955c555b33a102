//! The locked catalog and its dispatch path.

use crate::artifact::{compute_content_hash, RegistryArtifact};
use crate::descriptor::ToolDescriptor;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use switchboard_core::{CallContext, Envelope, Error, ToolFailure, ToolHandler};
use tracing::{debug, error, info, warn};

struct CatalogEntry {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// Builds a catalog from a registry artifact plus one handler per
/// descriptor. Consumed by [`CatalogBuilder::build`], which locks the
/// result — there is no mutating API on [`ToolCatalog`].
pub struct CatalogBuilder {
    descriptors: HashMap<String, ToolDescriptor>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    registry_version: String,
}

impl std::fmt::Debug for CatalogBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogBuilder")
            .field("descriptors", &self.descriptors.keys())
            .field("handlers", &self.handlers.keys())
            .field("registry_version", &self.registry_version)
            .finish()
    }
}

impl CatalogBuilder {
    /// Start from a validated registry artifact.
    pub fn from_artifact(artifact: RegistryArtifact) -> Result<Self, Error> {
        artifact.validate()?;
        let registry_version = artifact.version.clone();
        let descriptors = artifact
            .tools
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Ok(Self {
            descriptors,
            handlers: HashMap::new(),
            registry_version,
        })
    }

    /// Attach the handler body for a declared tool. Registering an id the
    /// artifact does not declare is an error — the artifact is the sole
    /// contract source.
    pub fn register(mut self, id: &str, handler: Arc<dyn ToolHandler>) -> Result<Self, Error> {
        if !self.descriptors.contains_key(id) {
            return Err(Error::registry(format!(
                "handler registered for undeclared tool '{id}'"
            )));
        }
        self.handlers.insert(id.to_string(), handler);
        Ok(self)
    }

    /// Lock the catalog. Every declared tool must have a handler.
    pub fn build(self) -> Result<ToolCatalog, Error> {
        let mut entries = HashMap::with_capacity(self.descriptors.len());
        let mut descriptors: Vec<ToolDescriptor> = Vec::with_capacity(self.descriptors.len());

        for (id, descriptor) in self.descriptors {
            let handler = self
                .handlers
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::registry(format!("no handler for declared tool '{id}'")))?;
            descriptors.push(descriptor.clone());
            entries.insert(id, CatalogEntry { descriptor, handler });
        }

        let version_hash = compute_content_hash(&descriptors);
        info!(
            registry_version = %self.registry_version,
            tools = entries.len(),
            version_hash = %version_hash,
            "Tool catalog locked"
        );

        Ok(ToolCatalog {
            entries,
            registry_version: self.registry_version,
            version_hash,
        })
    }
}

/// The immutable, locked collection of tool contracts and handlers.
///
/// Built once per process; every dispatch for a session's lifetime targets
/// this one consistent version.
pub struct ToolCatalog {
    entries: HashMap<String, CatalogEntry>,
    registry_version: String,
    version_hash: String,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("entries", &self.entries.keys())
            .field("registry_version", &self.registry_version)
            .field("version_hash", &self.version_hash)
            .finish()
    }
}

impl ToolCatalog {
    /// Look up a descriptor by id.
    pub fn describe(&self, id: &str) -> Option<&ToolDescriptor> {
        self.entries.get(id).map(|e| &e.descriptor)
    }

    /// All descriptors, for building a model-facing tool list.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    /// The registry document version this catalog was built from.
    pub fn registry_version(&self) -> &str {
        &self.registry_version
    }

    /// Content-derived hash over all descriptor schemas and docs. Lets a
    /// caller detect skew against a cached client view of the registry.
    pub fn version_hash(&self) -> &str {
        &self.version_hash
    }

    /// Validate arguments and run the handler exactly once.
    ///
    /// A validation failure returns before the handler is invoked, so it
    /// can never have side effects. A handler panic is caught and wrapped
    /// as an Internal failure. Running past the declared latency budget is
    /// logged, never aborted.
    pub async fn dispatch(
        &self,
        tool_id: &str,
        raw_args: serde_json::Value,
        mut ctx: CallContext,
    ) -> Envelope {
        let start = Instant::now();

        let Some(entry) = self.entries.get(tool_id) else {
            return Envelope::failure(ToolFailure::validation(format!("unknown tool '{tool_id}'")))
                .with_duration(start.elapsed().as_millis() as u64);
        };

        if let Err(violations) = entry.descriptor.parameters.validate(&raw_args) {
            let summary = violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            debug!(tool = tool_id, %summary, "Arguments rejected by schema");
            return Envelope::failure(
                ToolFailure::validation(format!("invalid arguments for '{tool_id}': {summary}"))
                    .with_detail(json!({ "violations": violations })),
            )
            .with_duration(start.elapsed().as_millis() as u64);
        }

        ctx.arguments = raw_args;
        let handler = Arc::clone(&entry.handler);
        let call_id = ctx.call_id.clone();

        // The handler runs on its own task so a panic inside it is
        // isolated and surfaces as a JoinError instead of unwinding
        // through dispatch.
        let result = tokio::spawn(async move { handler.run(ctx).await }).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let envelope = match result {
            Ok(Ok(output)) => Envelope::success(output.data).with_intents(output.intents),
            Ok(Err(failure)) => {
                debug!(tool = tool_id, kind = ?failure.kind, "Handler returned failure");
                Envelope::failure(failure)
            }
            Err(join_err) => {
                error!(tool = tool_id, call_id = %call_id, error = %join_err, "Handler panicked");
                Envelope::failure(ToolFailure::internal(format!(
                    "tool '{tool_id}' failed unexpectedly"
                )))
            }
        };

        if duration_ms > entry.descriptor.latency_budget_ms {
            warn!(
                tool = tool_id,
                budget_ms = entry.descriptor.latency_budget_ms,
                actual_ms = duration_ms,
                "Tool ran past its latency budget"
            );
        }

        envelope.with_duration(duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use switchboard_core::{
        ErrorKind, Intent, SessionId, SessionMode, SessionState, ToolOutput,
    };

    fn ctx() -> CallContext {
        CallContext {
            call_id: "call_1".into(),
            session_id: SessionId::new(),
            mode: SessionMode::Text,
            capabilities: vec![],
            arguments: serde_json::Value::Null,
            state: SessionState::new(SessionMode::Text),
        }
    }

    fn artifact() -> RegistryArtifact {
        serde_json::from_value(json!({
            "version": "test",
            "built_at": Utc::now(),
            "tools": [
                {
                    "id": "echo",
                    "version": "1.0.0",
                    "category": "utility",
                    "side_effect": "none",
                    "idempotent": true,
                    "allowed_modes": ["text", "voice"],
                    "latency_budget_ms": 1000,
                    "parameters": {
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    },
                    "docs": "Echoes back the input."
                },
                {
                    "id": "boom",
                    "version": "1.0.0",
                    "category": "utility",
                    "side_effect": "none",
                    "allowed_modes": ["text"],
                    "latency_budget_ms": 1000,
                    "parameters": { "properties": {}, "required": [] }
                }
            ]
        }))
        .unwrap()
    }

    struct CountingEcho {
        invocations: AtomicU32,
    }

    #[async_trait]
    impl ToolHandler for CountingEcho {
        async fn run(&self, ctx: CallContext) -> Result<ToolOutput, ToolFailure> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::data(ctx.arguments)
                .with_intent(Intent::SetPendingMessage { text: "echoed".into() }))
        }
    }

    struct Panicker;

    #[async_trait]
    impl ToolHandler for Panicker {
        async fn run(&self, _ctx: CallContext) -> Result<ToolOutput, ToolFailure> {
            panic!("handler bug");
        }
    }

    fn catalog_with(handler: Arc<CountingEcho>) -> ToolCatalog {
        CatalogBuilder::from_artifact(artifact())
            .unwrap()
            .register("echo", handler)
            .unwrap()
            .register("boom", Arc::new(Panicker))
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn valid_dispatch_invokes_handler_exactly_once() {
        let handler = Arc::new(CountingEcho { invocations: AtomicU32::new(0) });
        let catalog = catalog_with(Arc::clone(&handler));

        let env = catalog.dispatch("echo", json!({"text": "hi"}), ctx()).await;
        assert!(env.ok);
        assert_eq!(env.data.unwrap()["text"], "hi");
        assert_eq!(env.intents.len(), 1);
        assert_eq!(handler.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_handler() {
        let handler = Arc::new(CountingEcho { invocations: AtomicU32::new(0) });
        let catalog = catalog_with(Arc::clone(&handler));

        for bad_args in [
            json!({}),                             // missing required
            json!({"text": 42}),                   // wrong type
            json!({"text": "hi", "loud": true}),   // undeclared field
        ] {
            let env = catalog.dispatch("echo", bad_args, ctx()).await;
            assert!(!env.ok);
            assert_eq!(env.error.unwrap().kind, ErrorKind::Validation);
        }
        assert_eq!(handler.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_validation_failure() {
        let handler = Arc::new(CountingEcho { invocations: AtomicU32::new(0) });
        let catalog = catalog_with(handler);

        let env = catalog.dispatch("nonexistent", json!({}), ctx()).await;
        assert!(!env.ok);
        let err = env.error.unwrap();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("unknown tool"));
    }

    #[tokio::test]
    async fn handler_panic_becomes_internal_failure() {
        let handler = Arc::new(CountingEcho { invocations: AtomicU32::new(0) });
        let catalog = catalog_with(handler);

        let env = catalog.dispatch("boom", json!({}), ctx()).await;
        assert!(!env.ok);
        let err = env.error.unwrap();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!err.retryable);
    }

    #[test]
    fn build_requires_a_handler_per_descriptor() {
        let builder = CatalogBuilder::from_artifact(artifact())
            .unwrap()
            .register("echo", Arc::new(Panicker))
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("no handler"));
    }

    #[test]
    fn registering_undeclared_tool_fails() {
        let err = CatalogBuilder::from_artifact(artifact())
            .unwrap()
            .register("mystery", Arc::new(Panicker))
            .unwrap_err();
        assert!(err.to_string().contains("undeclared tool"));
    }

    #[test]
    fn describe_and_version_hash() {
        let catalog = CatalogBuilder::from_artifact(artifact())
            .unwrap()
            .register("echo", Arc::new(Panicker))
            .unwrap()
            .register("boom", Arc::new(Panicker))
            .unwrap()
            .build()
            .unwrap();

        assert!(catalog.describe("echo").is_some());
        assert!(catalog.describe("gone").is_none());
        assert_eq!(catalog.version_hash().len(), 64);
        assert_eq!(catalog.registry_version(), "test");
    }

    #[tokio::test]
    async fn dispatch_reports_duration() {
        let handler = Arc::new(CountingEcho { invocations: AtomicU32::new(0) });
        let catalog = catalog_with(handler);
        let env = catalog.dispatch("echo", json!({"text": "hi"}), ctx()).await;
        // Millisecond precision; just assert the field is populated sanely.
        assert!(env.meta.duration_ms < 5_000);
    }
}
