//! Bridge errors.

/// Message returned when an outbound call is made before `init`.
pub const NOT_INITIALIZED_MESSAGE: &str = "You need to call `init` before posting messages to the host";

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("init needs to be called with the URL of the site that hosts the add-in")]
    MissingHost,
    #[error("{}", NOT_INITIALIZED_MESSAGE)]
    NotInitialized,
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("failed to encode payload: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The host answered with an error event; the payload is passed through untouched.
    #[error("request rejected by host: {0}")]
    Rejected(serde_json::Value),
    #[error("bridge closed before the host replied")]
    Closed,
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
