//! User-facing fasting actions.
//!
//! Wraps the repository with the bookkeeping every presentation layer
//! needs: stamping the start with the current time, keeping goal-reached
//! reminders in step, and producing a progress summary.

use crate::error::StoreError;
use crate::persistence::Persistence;
use crate::repository::FastingRepository;
use onefast_core::{Clock, ProgressSummary};
use onefast_types::{goal_by_id, FastingSession};
use std::sync::Arc;
use tracing::info;

/// Schedules reminders for the end of a fast.
pub trait NotificationScheduler: Send + Sync {
    /// Replace any pending reminders with ones for this fast.
    fn schedule(&self, start_time_millis: i64, goal_id: &str);

    /// Drop all pending reminders.
    fn cancel_all(&self);
}

/// Reminder scheduler that only logs what it would schedule.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationScheduler;

impl NotificationScheduler for TracingNotificationScheduler {
    fn schedule(&self, start_time_millis: i64, goal_id: &str) {
        let goal = goal_by_id(goal_id);
        info!(
            goal = goal.id,
            due_at_millis = start_time_millis.saturating_add(goal.duration_millis),
            "goal reminder scheduled"
        );
    }

    fn cancel_all(&self) {
        info!("goal reminders cancelled");
    }
}

/// High-level fasting actions for one device.
pub struct FastingController<P: Persistence, N: NotificationScheduler> {
    repository: Arc<FastingRepository<P>>,
    notifications: N,
    clock: Arc<dyn Clock>,
}

impl<P: Persistence, N: NotificationScheduler> FastingController<P, N> {
    /// Create a controller over `repository`.
    pub fn new(
        repository: Arc<FastingRepository<P>>,
        notifications: N,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            repository,
            notifications,
            clock: Arc::new(clock),
        }
    }

    /// The wrapped repository.
    pub fn repository(&self) -> &FastingRepository<P> {
        &self.repository
    }

    /// Start a fast now.
    pub async fn start_now(&self) -> Result<FastingSession, StoreError> {
        self.start_at(self.clock.now_millis()).await
    }

    /// Start a fast at an explicit time (e.g. "I started an hour ago").
    pub async fn start_at(&self, start_time_millis: i64) -> Result<FastingSession, StoreError> {
        let session = self.repository.start_fasting(start_time_millis).await?;
        self.notifications
            .schedule(session.start_time_millis, &session.fasting_goal_id);
        Ok(session)
    }

    /// End the current fast, keeping the selected goal.
    ///
    /// The goal comes from the last published session, so a degraded read
    /// cannot reset it to the default.
    pub async fn stop(&self) -> Result<FastingSession, StoreError> {
        let goal_id = match self.repository.store().latest() {
            Ok(session) => session.fasting_goal_id,
            Err(_) => self.repository.snapshot().await?.fasting_goal_id,
        };
        let session = self.repository.stop_fasting(&goal_id).await?;
        self.notifications.cancel_all();
        Ok(session)
    }

    /// Move the start of the current fast.
    pub async fn edit_start(&self, start_time_millis: i64) -> Result<FastingSession, StoreError> {
        let session = self.repository.update_schedule(start_time_millis).await?;
        if session.is_active() {
            self.notifications
                .schedule(session.start_time_millis, &session.fasting_goal_id);
        }
        Ok(session)
    }

    /// Select a different goal.
    pub async fn change_goal(&self, goal_id: &str) -> Result<FastingSession, StoreError> {
        let session = self.repository.update_goal(goal_id).await?;
        if session.is_active() {
            self.notifications
                .schedule(session.start_time_millis, &session.fasting_goal_id);
        }
        Ok(session)
    }

    /// Progress of the current fast as of now.
    pub async fn summary(&self) -> Result<ProgressSummary, StoreError> {
        let session = self.repository.snapshot().await?;
        Ok(ProgressSummary::from_session(
            &session,
            self.clock.now_millis(),
        ))
    }
}
