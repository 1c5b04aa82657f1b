//! Error types for fast-client.

use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::transport::TransportError;
use onefast_types::WireError;

/// Errors surfaced by the fasting-state store.
///
/// Transient read failures never reach this type; they are recovered by
/// substituting defaults. What remains is either a write that did not commit
/// or a read failure that points at a defect.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The persistence layer failed in a way that must not be masked.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors at the cross-device sync boundary.
///
/// These are logged and swallowed; local state has already committed by the
/// time a sync error can happen.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The session could not be encoded or an inbound item could not be decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The transport refused or lost the item.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
