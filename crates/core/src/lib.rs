//! # Switchboard Core
//!
//! Domain types, traits, and error definitions for the Switchboard
//! request-orchestration core. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined against the types here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod canonical;
pub mod envelope;
pub mod error;
pub mod event;
pub mod intent;
pub mod session;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use envelope::{Envelope, EnvelopeMeta, ErrorKind, ToolFailure};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use intent::{EndTiming, Intent};
pub use session::{SessionId, SessionMode, SideEffectClass, ToolCategory};
pub use state::SessionState;
pub use tool::{CallContext, ToolHandler, ToolOutput};
