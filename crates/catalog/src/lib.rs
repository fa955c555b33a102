//! Tool catalog and dispatch for Switchboard.
//!
//! The catalog is the closed, explicit mapping from tool id to a handler
//! plus a schema-validated argument contract. It is built once from a
//! precompiled registry artifact, then **locked**: after locking no
//! descriptor can be added, removed, or mutated, so every dispatch in a
//! session's lifetime targets one consistent registry version.

pub mod artifact;
pub mod catalog;
pub mod descriptor;
pub mod schema;

pub use artifact::RegistryArtifact;
pub use catalog::{CatalogBuilder, ToolCatalog};
pub use descriptor::ToolDescriptor;
pub use schema::{ParamSchema, PropertySchema, SchemaType, SchemaViolation};
