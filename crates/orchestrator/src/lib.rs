//! # Switchboard Orchestrator
//!
//! The per-turn request pipeline tying the bounded contexts together.
//! Each tool-call request flows policy → loop pre-check → catalog
//! dispatch → loop record → memory record, and every rejection stage
//! produces the same [`Envelope`](switchboard_core::Envelope) shape. State
//! mutation happens only through intent application by the single-writer
//! [`StateController`].

mod controller;
mod orchestrator;
mod request;

pub use controller::StateController;
pub use orchestrator::Orchestrator;
pub use request::DispatchRequest;
