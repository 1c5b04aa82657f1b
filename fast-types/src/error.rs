//! Error types for the onefast wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding sync messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Item was addressed to a path this decoder does not own
    #[error("unexpected path: {0}")]
    UnexpectedPath(String),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}
