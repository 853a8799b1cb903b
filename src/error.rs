//! Error types for copilot-session.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the session core.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable storage failed to read, write or remove an entry.
    #[error("storage error: {0}")]
    Storage(String),

    /// A cached or remote payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend reported a failure for the user profile request.
    #[error("backend error: {0}")]
    Backend(String),

    /// Transport-level failure talking to a remote service.
    #[error("network error: {0}")]
    Network(String),

    /// The transaction oracle answered with an error.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// The authentication provider failed.
    #[error("auth provider error: {0}")]
    Auth(String),

    /// A verification could not be registered.
    #[error("verification error: {0}")]
    Verification(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
