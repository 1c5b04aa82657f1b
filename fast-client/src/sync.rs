//! Cross-device sync.
//!
//! Outbound: after each local write the repository hands the new session
//! to [`CrossDeviceSync::propagate`], which queues it for a background
//! sender task and returns immediately. Send failures are logged; local
//! state has already committed and is not rolled back.
//!
//! Inbound: [`spawn_listener`] decodes items from the transport and applies
//! them through [`FastingStateStore::apply_remote`]. The listener only holds
//! the store, so it cannot re-publish what it receives.

use crate::error::SyncError;
use crate::persistence::Persistence;
use crate::store::{FastingStateStore, RemoteUpdate};
use crate::transport::{Transport, TransportError};
use onefast_types::{DataItem, FastingSession, SessionPayload, FASTING_PATH};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

enum Outbound {
    Publish(FastingSession),
    Flush(oneshot::Sender<()>),
}

/// Outbound half of device-to-device sync.
pub struct CrossDeviceSync {
    queue: mpsc::UnboundedSender<Outbound>,
    worker: JoinHandle<()>,
}

impl CrossDeviceSync {
    /// Start the background sender over `transport`.
    pub fn spawn<T: Transport + 'static>(transport: Arc<T>) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                match outbound {
                    Outbound::Publish(session) => {
                        match send_session(transport.as_ref(), &session).await {
                            Ok(()) => debug!(
                                is_fasting = session.is_fasting,
                                last_updated = session.last_updated_millis,
                                "propagated fasting state"
                            ),
                            Err(e) => error!(error = %e, "failed to propagate fasting state"),
                        }
                    }
                    Outbound::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("sync sender stopped");
        });
        Self { queue, worker }
    }

    /// Queue `session` for the paired device. Never blocks, never fails.
    pub fn propagate(&self, session: &FastingSession) {
        if self
            .queue
            .send(Outbound::Publish(session.clone()))
            .is_err()
        {
            warn!("sync sender is gone, dropping update");
        }
    }

    /// Wait until everything queued so far has been handed to the transport.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(Outbound::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Drain the queue and stop the sender task.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "sync sender task failed");
        }
    }
}

async fn send_session<T: Transport + ?Sized>(
    transport: &T,
    session: &FastingSession,
) -> Result<(), SyncError> {
    let item = SessionPayload::from(session).to_data_item()?;
    transport.send(&item).await?;
    Ok(())
}

/// Decode an inbound item.
///
/// Items on other paths are not ours and yield `Ok(None)`.
pub fn decode_inbound(item: &DataItem) -> Result<Option<RemoteUpdate>, SyncError> {
    if item.path != FASTING_PATH {
        return Ok(None);
    }
    let payload = SessionPayload::from_data_item(item)?;
    Ok(Some(payload.into()))
}

/// Apply items arriving on `transport` to `store` until the peer goes away.
pub fn spawn_listener<T, P>(transport: Arc<T>, store: Arc<FastingStateStore<P>>) -> JoinHandle<()>
where
    T: Transport + 'static,
    P: Persistence + 'static,
{
    tokio::spawn(async move {
        loop {
            let item = match transport.recv().await {
                Ok(item) => item,
                Err(TransportError::ConnectionClosed) => {
                    info!("paired device disconnected");
                    break;
                }
                Err(e) if transport.is_connected() => {
                    warn!(error = %e, "failed to receive item, waiting for the next one");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "transport lost, stopping listener");
                    break;
                }
            };

            match decode_inbound(&item) {
                Ok(Some(update)) => {
                    debug!(?update, "received fasting state");
                    if let Err(e) = store.apply_remote(update).await {
                        error!(error = %e, "failed to apply remote fasting state");
                    }
                }
                Ok(None) => debug!(path = %item.path, "ignoring item on unrelated path"),
                Err(e) => warn!(error = %e, "dropping malformed fasting item"),
            }
        }
    })
}
