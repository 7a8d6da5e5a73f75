//! Unified error handling for the client runtime.

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid auth token")]
    InvalidToken,

    #[error("Engine error: {0}")]
    Engine(#[from] berth_engine::Error),
}

impl ClientError {
    /// Whether the request may succeed if repeated later.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
