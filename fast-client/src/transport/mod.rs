//! Device-to-device transport.
//!
//! A transport moves whole [`DataItem`]s between two paired devices. It has
//! no opinion on what the items mean; decoding and applying them is the
//! sync layer's job.
//!
//! # Implementations
//!
//! - [`MockTransport`]: records sent items, replays queued ones (tests)
//! - [`LinkTransport`]: an in-process pair, one end per simulated device
//! - [`TcpTransport`]: length-prefixed frames over a TCP stream
//!
//! # Example
//!
//! ```ignore
//! let (phone, watch) = LinkTransport::pair();
//! phone.send(&item).await?;
//! let received = watch.recv().await?;
//! ```

mod link;
mod mock;
mod tcp;

pub use link::LinkTransport;
pub use mock::MockTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use onefast_types::DataItem;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// A bidirectional channel to one paired device.
///
/// Both directions may be used concurrently from different tasks, so every
/// method takes `&self`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish an item to the peer.
    async fn send(&self, item: &DataItem) -> Result<(), TransportError>;

    /// Wait for the next item from the peer.
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the peer is gone.
    async fn recv(&self) -> Result<DataItem, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        assert_eq!(
            TransportError::ConnectionFailed("refused".into()).to_string(),
            "connection failed: refused"
        );
        assert_eq!(TransportError::NotConnected.to_string(), "not connected");
        assert_eq!(TransportError::Timeout.to_string(), "connection timeout");
    }

    #[test]
    fn transports_are_object_safe() {
        fn assert_dyn(_: &dyn Transport) {}
        assert_dyn(&MockTransport::new());
    }
}
