//! Operator-facing error types.
//!
//! These are configuration-level failures (a missing or malformed registry
//! artifact, a bad config file) that surface to whoever runs the backend.
//! They are deliberately distinct from [`crate::envelope::ToolFailure`],
//! which travels as data inside envelopes and is translated by the calling
//! agent — the two never mix.

use thiserror::Error;

/// The top-level error type for Switchboard setup and operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Registry error: {message}")]
    Registry { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
