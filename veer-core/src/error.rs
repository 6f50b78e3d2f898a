//! Error types for the Veer core library.

use thiserror::Error;

/// Top-level error type for Veer operations that can fail.
///
/// Scoring and event recording never fail outwardly; they degrade to safe
/// defaults. Only configuration loading surfaces errors to the caller.
#[derive(Error, Debug)]
pub enum VeerError {
    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No agent with the given stable id is registered in the session.
    #[error("Agent not found: {0}")]
    AgentNotFound(crate::AgentId),

    /// A hook handler failed.
    #[error("Hook handler failed on {event}: {source}")]
    Handler {
        /// Event name the handler was subscribed to.
        event: String,
        /// Underlying failure.
        #[source]
        source: HookError,
    },

    /// The native evaluator failed.
    #[error("Evaluator failed: {0}")]
    Evaluator(#[from] EvalError),

    /// Serialization failure (snapshot export).
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a hook handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HookError {
    /// Human-readable description.
    pub message: String,
}

impl HookError {
    /// Create a handler error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error used when a handler panicked instead of returning.
    #[must_use]
    pub fn panicked() -> Self {
        Self::new("handler panicked")
    }
}

/// Failure reported by the host's native evaluator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EvalError {
    /// Human-readable description.
    pub message: String,
}

impl EvalError {
    /// Create an evaluator error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, VeerError>;
