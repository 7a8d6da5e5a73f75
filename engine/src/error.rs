//! Error types for the Berth engine.

use crate::ActionId;
use thiserror::Error;

/// All possible errors from the Berth engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("unknown action kind: {0}")]
    UnknownActionKind(String),

    #[error("pending action not found: {0}")]
    ActionNotFound(ActionId),

    // Payload errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported snapshot format version: {found} (max supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
