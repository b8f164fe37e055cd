//! Error types for the flash message system.

use thiserror::Error;

use crate::message::MessageId;

/// Result type for flash message operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the flash message system.
///
/// Store lookups never fail: removing an absent id is a no-op, and a message
/// without callbacks simply skips them.
#[derive(Debug, Error)]
pub enum Error {
    /// The message is already registered in the store.
    #[error("Message already emitted: {0}")]
    AlreadyEmitted(MessageId),

    /// The message has been destroyed and accepts no further operations.
    #[error("Message destroyed: {0}")]
    Destroyed(MessageId),

    /// No async runtime is available to run self-destruct timers.
    #[error("No async runtime available to schedule timers")]
    NoRuntime,

    /// Invalid installation configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The host framework rejected a registration.
    #[error("Host error: {0}")]
    Host(#[from] anyhow::Error),
}
