//! The fasting repository: the one API presentation layers talk to.
//!
//! Local operations write through the store and then hand the committed
//! session to sync. [`FastingRepository::update_from_remote`] writes
//! through the store only.

use crate::error::StoreError;
use crate::persistence::Persistence;
use crate::store::{FastingStateStore, LocalMutation, RemoteUpdate, SessionSubscription};
use crate::sync::CrossDeviceSync;
use onefast_types::FastingSession;
use std::sync::Arc;
use tracing::info;

/// Fasting-state repository for one device.
pub struct FastingRepository<P: Persistence> {
    store: Arc<FastingStateStore<P>>,
    sync: Option<CrossDeviceSync>,
}

impl<P: Persistence> FastingRepository<P> {
    /// Build a repository that propagates local changes through `sync`.
    pub fn new(store: FastingStateStore<P>, sync: CrossDeviceSync) -> Self {
        Self {
            store: Arc::new(store),
            sync: Some(sync),
        }
    }

    /// Build a repository with no paired device.
    pub fn local_only(store: FastingStateStore<P>) -> Self {
        Self {
            store: Arc::new(store),
            sync: None,
        }
    }

    /// Shared handle to the store, e.g. for an inbound listener.
    pub fn store(&self) -> Arc<FastingStateStore<P>> {
        Arc::clone(&self.store)
    }

    /// Subscribe to the session (current value first).
    pub fn read(&self) -> SessionSubscription {
        self.store.subscribe()
    }

    /// One-shot read of the persisted session.
    pub async fn snapshot(&self) -> Result<FastingSession, StoreError> {
        self.store.snapshot().await
    }

    /// Open a fast starting at `start_time_millis`.
    pub async fn start_fasting(&self, start_time_millis: i64) -> Result<FastingSession, StoreError> {
        info!(start_time_millis, "starting fast");
        self.apply_local(LocalMutation::Start { start_time_millis })
            .await
    }

    /// Close the fast, keeping `goal_id` for next time.
    pub async fn stop_fasting(&self, goal_id: &str) -> Result<FastingSession, StoreError> {
        info!(goal_id, "stopping fast");
        self.apply_local(LocalMutation::Stop {
            goal_id: goal_id.to_string(),
        })
        .await
    }

    /// Move the start time of the current (or next) fast.
    pub async fn update_schedule(
        &self,
        start_time_millis: i64,
    ) -> Result<FastingSession, StoreError> {
        info!(start_time_millis, "rescheduling fast");
        self.apply_local(LocalMutation::Reschedule { start_time_millis })
            .await
    }

    /// Select a different goal.
    pub async fn update_goal(&self, goal_id: &str) -> Result<FastingSession, StoreError> {
        info!(goal_id, "changing goal");
        self.apply_local(LocalMutation::ChangeGoal {
            goal_id: goal_id.to_string(),
        })
        .await
    }

    /// Apply a session received from the paired device. Never propagated.
    pub async fn update_from_remote(
        &self,
        start_time_millis: i64,
        goal_id: &str,
        is_fasting: bool,
        updated_at_millis: i64,
    ) -> Result<FastingSession, StoreError> {
        self.store
            .apply_remote(RemoteUpdate {
                is_fasting,
                start_time_millis,
                fasting_goal_id: goal_id.to_string(),
                last_updated_millis: updated_at_millis,
            })
            .await
    }

    /// Wait for queued propagations to reach the transport.
    pub async fn flush(&self) {
        if let Some(sync) = &self.sync {
            sync.flush().await;
        }
    }

    async fn apply_local(&self, mutation: LocalMutation) -> Result<FastingSession, StoreError> {
        let session = self.store.apply_local(mutation).await?;
        if let Some(sync) = &self.sync {
            sync.propagate(&session);
        }
        Ok(session)
    }
}
