//! Mock transport for testing.
//!
//! Records sent items and replays queued inbound ones.

use super::{Transport, TransportError};
use async_trait::async_trait;
use onefast_types::DataItem;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock transport for testing.
///
/// Starts connected. Clones share state, so a test can keep one handle while
/// the sync layer owns another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug)]
struct MockTransportInner {
    connected: bool,
    sent_items: Vec<DataItem>,
    receive_queue: VecDeque<DataItem>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner {
                connected: true,
                sent_items: Vec::new(),
                receive_queue: VecDeque::new(),
                fail_next_send: None,
                fail_next_recv: None,
            })),
        }
    }
}

impl MockTransport {
    /// Create a new, connected mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an item to be returned by a later `recv()`.
    pub fn queue_inbound(&self, item: DataItem) {
        self.lock().receive_queue.push_back(item);
    }

    /// Every item sent so far.
    pub fn sent_items(&self) -> Vec<DataItem> {
        self.lock().sent_items.clone()
    }

    /// The most recently sent item.
    pub fn last_sent(&self) -> Option<DataItem> {
        self.lock().sent_items.last().cloned()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        self.lock().fail_next_recv = Some(error.to_string());
    }

    /// Simulate the peer going away (or coming back).
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, item: &DataItem) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_items.push(item.clone());
        Ok(())
    }

    async fn recv(&self) -> Result<DataItem, TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_recv.take() {
            return Err(TransportError::ReceiveFailed(error));
        }

        inner
            .receive_queue
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.lock().connected = false;
        Ok(())
    }
}
