//! In-process transport pair.
//!
//! Two endpoints joined by unbounded channels. Each end is one simulated
//! device; whatever one sends the other receives, in order.

use super::{Transport, TransportError};
use async_trait::async_trait;
use onefast_types::DataItem;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};

/// One end of an in-process link.
#[derive(Debug)]
pub struct LinkTransport {
    outbound: Mutex<Option<mpsc::UnboundedSender<DataItem>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<DataItem>>,
    open: AtomicBool,
}

impl LinkTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    fn new(
        outbound: mpsc::UnboundedSender<DataItem>,
        inbound: mpsc::UnboundedReceiver<DataItem>,
    ) -> Self {
        Self {
            outbound: Mutex::new(Some(outbound)),
            inbound: Mutex::new(inbound),
            open: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Transport for LinkTransport {
    async fn send(&self, item: &DataItem) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let sender = outbound.as_ref().ok_or(TransportError::NotConnected)?;
        sender
            .send(item.clone())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn recv(&self) -> Result<DataItem, TransportError> {
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        // Dropping our sender ends the peer's recv().
        self.outbound.lock().await.take();
        Ok(())
    }
}
