//! The fasting-state store.
//!
//! Single owner of the persisted session. Every write goes through here,
//! is committed before it is observable, and is then fanned out to all
//! subscribers. Subscribers always see the current value first.
//!
//! # Read recovery
//!
//! Fields are decoded independently. A transient failure on one field
//! substitutes that field's default and logs a warning; a contract failure
//! is published to subscribers as an error instead of being masked.
//!
//! A write that committed is never reported back as failed. If reading the
//! committed record hits a contract failure, subscribers get the error and
//! the writer gets the committed values, with any unreadable field taken
//! from the last good session.

use crate::error::StoreError;
use crate::persistence::{Persistence, PersistenceError, PrefValue, Preferences};
use futures_util::stream::{self, Stream};
use onefast_core::Clock;
use onefast_types::{keys, FastingSession, SessionPayload, UNSET_START_TIME};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Default buffer for each subscriber before it starts lagging.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

type Update = Result<FastingSession, StoreError>;

/// A write originating on this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMutation {
    /// Open a fast at the given start time.
    Start {
        /// Epoch milliseconds.
        start_time_millis: i64,
    },
    /// Close the fast, clearing the start time and recording the goal.
    Stop {
        /// Goal to keep for the next fast.
        goal_id: String,
    },
    /// Move the start time without opening or closing the fast.
    Reschedule {
        /// Epoch milliseconds.
        start_time_millis: i64,
    },
    /// Select a different goal.
    ChangeGoal {
        /// Goal id from the preset catalog.
        goal_id: String,
    },
}

impl LocalMutation {
    fn apply(self, prefs: &mut Preferences, stamp: i64) {
        match self {
            Self::Start { start_time_millis } => {
                prefs.set(keys::IS_FASTING, PrefValue::Bool(true));
                prefs.set(keys::START_TIME, PrefValue::Long(start_time_millis));
            }
            Self::Stop { goal_id } => {
                prefs.set(keys::IS_FASTING, PrefValue::Bool(false));
                prefs.set(keys::START_TIME, PrefValue::Long(UNSET_START_TIME));
                prefs.set(keys::FASTING_GOAL_ID, PrefValue::Text(goal_id));
            }
            Self::Reschedule { start_time_millis } => {
                prefs.set(keys::START_TIME, PrefValue::Long(start_time_millis));
            }
            Self::ChangeGoal { goal_id } => {
                prefs.set(keys::FASTING_GOAL_ID, PrefValue::Text(goal_id));
            }
        }
        prefs.set(keys::LAST_UPDATED, PrefValue::Long(stamp));
    }
}

/// A full session received from a paired device, applied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUpdate {
    /// Whether the peer has a fast open.
    pub is_fasting: bool,
    /// Peer's start time, epoch milliseconds.
    pub start_time_millis: i64,
    /// Peer's goal id.
    pub fasting_goal_id: String,
    /// Peer's write timestamp.
    pub last_updated_millis: i64,
}

impl RemoteUpdate {
    fn apply(self, prefs: &mut Preferences) {
        prefs.set(keys::IS_FASTING, PrefValue::Bool(self.is_fasting));
        prefs.set(keys::START_TIME, PrefValue::Long(self.start_time_millis));
        prefs.set(keys::FASTING_GOAL_ID, PrefValue::Text(self.fasting_goal_id));
        prefs.set(keys::LAST_UPDATED, PrefValue::Long(self.last_updated_millis));
    }
}

impl From<SessionPayload> for RemoteUpdate {
    fn from(payload: SessionPayload) -> Self {
        Self {
            is_fasting: payload.is_fasting,
            start_time_millis: payload.start_time_millis,
            fasting_goal_id: payload.fasting_goal_id,
            last_updated_millis: payload.last_updated_millis,
        }
    }
}

/// Persisted, observable fasting session.
pub struct FastingStateStore<P: Persistence> {
    persistence: P,
    clock: Arc<dyn Clock>,
    latest: Mutex<Update>,
    updates: broadcast::Sender<Update>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<P: Persistence> FastingStateStore<P> {
    /// Open the store and read the initial session.
    pub async fn open(persistence: P, clock: impl Clock + 'static) -> Self {
        Self::with_capacity(persistence, clock, DEFAULT_SUBSCRIBER_CAPACITY).await
    }

    /// Open the store with a custom per-subscriber buffer.
    pub async fn with_capacity(
        persistence: P,
        clock: impl Clock + 'static,
        subscriber_capacity: usize,
    ) -> Self {
        let initial = load_session(&persistence).await;
        let (updates, _) = broadcast::channel(subscriber_capacity.max(1));
        Self {
            persistence,
            clock: Arc::new(clock),
            latest: Mutex::new(initial),
            updates,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Subscribe to the session. The current value is delivered first.
    pub fn subscribe(&self) -> SessionSubscription {
        // Holding `latest` keeps a concurrent publish from landing between
        // the snapshot and the receiver registration.
        let latest = self.lock_latest();
        SessionSubscription {
            pending: Some(latest.clone()),
            receiver: self.updates.subscribe(),
        }
    }

    /// The most recently published value, without touching storage.
    pub fn latest(&self) -> Update {
        self.lock_latest().clone()
    }

    /// Read the session from storage.
    pub async fn snapshot(&self) -> Update {
        load_session(&self.persistence).await
    }

    /// Re-read storage and publish if it changed underneath us.
    ///
    /// Only needed when another process shares the same backend. A transient
    /// failure of the whole read keeps the last published value.
    pub async fn refresh(&self) -> Update {
        let _guard = self.write_lock.lock().await;
        let current = match self.persistence.load().await {
            Ok(prefs) => decode_session(&prefs),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "failed to re-read fasting state, keeping last value");
                return self.latest();
            }
            Err(err) => Err(err.into()),
        };
        let changed = match (&current, &*self.lock_latest()) {
            (Ok(now), Ok(before)) => now != before,
            _ => true,
        };
        if changed {
            self.publish(current.clone());
        }
        current
    }

    /// Apply a local write, stamping `last_updated`.
    ///
    /// The stamp never goes backwards, even if the wall clock does.
    pub async fn apply_local(&self, mutation: LocalMutation) -> Update {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now_millis();
        debug!(?mutation, "applying local mutation");

        let committed = self
            .persistence
            .update(Box::new(move |prefs| {
                let previous = prefs
                    .get_long(keys::LAST_UPDATED)
                    .ok()
                    .flatten()
                    .unwrap_or(0);
                mutation.apply(prefs, now.max(previous));
            }))
            .await?;

        Ok(self.settle(&committed))
    }

    /// Apply a session received from a paired device.
    ///
    /// All four fields are written as received. This path has no route back
    /// to the sync layer.
    pub async fn apply_remote(&self, remote: RemoteUpdate) -> Update {
        let _guard = self.write_lock.lock().await;
        debug!(?remote, "applying remote update");

        let committed = self
            .persistence
            .update(Box::new(move |prefs| remote.apply(prefs)))
            .await?;

        Ok(self.settle(&committed))
    }

    /// Publish a committed record and return the session it holds.
    fn settle(&self, committed: &Preferences) -> FastingSession {
        let fallback = match &*self.lock_latest() {
            Ok(session) => session.clone(),
            Err(_) => FastingSession::default(),
        };
        let update = decode_session(committed);
        self.publish(update.clone());
        match update {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "write committed but read-back failed");
                decode_over(committed, fallback)
            }
        }
    }

    fn publish(&self, update: Update) {
        let mut latest = self.lock_latest();
        *latest = update.clone();
        // No receivers is fine; `latest` still carries the value.
        let _ = self.updates.send(update);
    }

    fn lock_latest(&self) -> MutexGuard<'_, Update> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn load_session<P: Persistence>(persistence: &P) -> Update {
    match persistence.load().await {
        Ok(prefs) => decode_session(&prefs),
        Err(err) if err.is_transient() => {
            warn!(error = %err, "failed to read fasting state, using defaults");
            Ok(FastingSession::default())
        }
        Err(err) => Err(err.into()),
    }
}

fn decode_session(prefs: &Preferences) -> Update {
    let defaults = FastingSession::default();
    Ok(FastingSession {
        is_fasting: recover(
            keys::IS_FASTING,
            prefs.get_bool(keys::IS_FASTING),
            defaults.is_fasting,
        )?,
        start_time_millis: recover(
            keys::START_TIME,
            prefs.get_long(keys::START_TIME),
            defaults.start_time_millis,
        )?,
        fasting_goal_id: recover(
            keys::FASTING_GOAL_ID,
            prefs.get_text(keys::FASTING_GOAL_ID),
            defaults.fasting_goal_id,
        )?,
        last_updated_millis: recover(
            keys::LAST_UPDATED,
            prefs.get_long(keys::LAST_UPDATED),
            defaults.last_updated_millis,
        )?,
    })
}

/// Decode what is readable, filling the rest from `fallback`.
fn decode_over(prefs: &Preferences, fallback: FastingSession) -> FastingSession {
    FastingSession {
        is_fasting: prefs
            .get_bool(keys::IS_FASTING)
            .ok()
            .flatten()
            .unwrap_or(fallback.is_fasting),
        start_time_millis: prefs
            .get_long(keys::START_TIME)
            .ok()
            .flatten()
            .unwrap_or(fallback.start_time_millis),
        fasting_goal_id: prefs
            .get_text(keys::FASTING_GOAL_ID)
            .ok()
            .flatten()
            .unwrap_or(fallback.fasting_goal_id),
        last_updated_millis: prefs
            .get_long(keys::LAST_UPDATED)
            .ok()
            .flatten()
            .unwrap_or(fallback.last_updated_millis),
    }
}

fn recover<T>(
    key: &str,
    read: Result<Option<T>, PersistenceError>,
    default: T,
) -> Result<T, StoreError> {
    match read {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(err) if err.is_transient() => {
            warn!(key, error = %err, "unreadable field, using default");
            Ok(default)
        }
        Err(err) => Err(err.into()),
    }
}

/// A live view of the session.
///
/// Yields the value current at subscription time, then every later one in
/// commit order. A subscriber that falls more than the buffer behind skips
/// the values it missed and carries on from the oldest one still buffered.
pub struct SessionSubscription {
    pending: Option<Update>,
    receiver: broadcast::Receiver<Update>,
}

impl SessionSubscription {
    /// Wait for the next value. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Update> {
        if let Some(first) = self.pending.take() {
            return Some(first);
        }
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Update> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|update| (update, subscription))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use futures_util::StreamExt;
    use onefast_core::ManualClock;
    use std::sync::Arc;

    const T: i64 = 1_705_000_000_000;

    async fn store_at(now: i64) -> (FastingStateStore<MemoryPersistence>, MemoryPersistence, ManualClock) {
        let backend = MemoryPersistence::new();
        let clock = ManualClock::new(now);
        let store = FastingStateStore::open(backend.clone(), clock.clone()).await;
        (store, backend, clock)
    }

    #[tokio::test]
    async fn fresh_store_yields_default() {
        let (store, _, _) = store_at(T).await;
        let mut sub = store.subscribe();
        assert_eq!(sub.next().await.unwrap().unwrap(), FastingSession::default());
    }

    #[tokio::test]
    async fn subscriber_sees_current_then_changes_in_order() {
        let (store, _, clock) = store_at(T).await;
        let mut sub = store.subscribe();

        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();
        clock.advance(1_000);
        store
            .apply_local(LocalMutation::ChangeGoal { goal_id: "18:6".into() })
            .await
            .unwrap();

        assert!(!sub.next().await.unwrap().unwrap().is_fasting);
        let started = sub.next().await.unwrap().unwrap();
        assert!(started.is_fasting);
        assert_eq!(started.start_time_millis, T);
        assert_eq!(started.last_updated_millis, T);
        let changed = sub.next().await.unwrap().unwrap();
        assert_eq!(changed.fasting_goal_id, "18:6");
        assert_eq!(changed.last_updated_millis, T + 1_000);
    }

    #[tokio::test]
    async fn late_subscriber_gets_current_value_first() {
        let (store, _, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();

        let mut sub = store.subscribe();
        assert!(sub.next().await.unwrap().unwrap().is_fasting);
    }

    #[tokio::test]
    async fn stop_clears_start_and_keeps_goal() {
        let (store, _, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();
        let stopped = store
            .apply_local(LocalMutation::Stop { goal_id: "20:4".into() })
            .await
            .unwrap();

        assert!(!stopped.is_fasting);
        assert_eq!(stopped.start_time_millis, UNSET_START_TIME);
        assert_eq!(stopped.fasting_goal_id, "20:4");
    }

    #[tokio::test]
    async fn stop_twice_is_idempotent() {
        let (store, _, clock) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();
        let first = store
            .apply_local(LocalMutation::Stop { goal_id: "18:6".into() })
            .await
            .unwrap();
        clock.advance(10);
        let second = store
            .apply_local(LocalMutation::Stop { goal_id: "18:6".into() })
            .await
            .unwrap();

        assert_eq!(
            FastingSession {
                last_updated_millis: first.last_updated_millis,
                ..second.clone()
            },
            first
        );
        assert!(second.last_updated_millis > first.last_updated_millis);
    }

    #[tokio::test]
    async fn reschedule_keeps_fasting_flag() {
        let (store, _, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();
        let moved = store
            .apply_local(LocalMutation::Reschedule {
                start_time_millis: T - 3_600_000,
            })
            .await
            .unwrap();
        assert!(moved.is_fasting);
        assert_eq!(moved.start_time_millis, T - 3_600_000);
    }

    #[tokio::test]
    async fn local_stamp_never_goes_backwards() {
        let (store, _, clock) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();

        clock.set(T - 60_000);
        let session = store
            .apply_local(LocalMutation::ChangeGoal { goal_id: "12:12".into() })
            .await
            .unwrap();
        assert_eq!(session.last_updated_millis, T);
    }

    #[tokio::test]
    async fn remote_update_is_applied_verbatim() {
        let (store, _, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();

        let session = store
            .apply_remote(RemoteUpdate {
                is_fasting: false,
                start_time_millis: -1,
                fasting_goal_id: "36h".into(),
                last_updated_millis: T - 5_000,
            })
            .await
            .unwrap();
        assert!(!session.is_fasting);
        assert_eq!(session.fasting_goal_id, "36h");
        assert_eq!(session.last_updated_millis, T - 5_000);
    }

    #[tokio::test]
    async fn transient_field_failure_falls_back_per_field() {
        let (store, backend, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();
        store
            .apply_local(LocalMutation::ChangeGoal { goal_id: "18:6".into() })
            .await
            .unwrap();

        backend.inject_read_fault(
            keys::START_TIME,
            PersistenceError::Decode {
                key: keys::START_TIME.into(),
                reason: "corrupt".into(),
            },
        );

        let session = store.snapshot().await.unwrap();
        assert!(session.is_fasting);
        assert_eq!(session.start_time_millis, UNSET_START_TIME);
        assert_eq!(session.fasting_goal_id, "18:6");
        assert_eq!(session.last_updated_millis, T);
    }

    #[tokio::test]
    async fn transient_load_failure_yields_defaults() {
        let backend = MemoryPersistence::new();
        backend.fail_next_load(PersistenceError::Io("disk asleep".into()));
        let store = FastingStateStore::open(backend, ManualClock::new(T)).await;

        let mut sub = store.subscribe();
        assert_eq!(sub.next().await.unwrap().unwrap(), FastingSession::default());
    }

    #[tokio::test]
    async fn contract_failure_reaches_subscribers() {
        let backend = MemoryPersistence::new();
        backend.fail_next_load(PersistenceError::Contract("no such table".into()));
        let store = FastingStateStore::open(backend, ManualClock::new(T)).await;

        let mut sub = store.subscribe();
        let first = sub.next().await.unwrap();
        assert!(matches!(
            first,
            Err(StoreError::Persistence(PersistenceError::Contract(_)))
        ));
    }

    #[tokio::test]
    async fn committed_write_survives_contract_fault_on_read_back() {
        let (store, backend, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::ChangeGoal { goal_id: "20:4".into() })
            .await
            .unwrap();
        let mut sub = store.subscribe();
        sub.next().await.unwrap().unwrap();

        backend.inject_read_fault(
            keys::FASTING_GOAL_ID,
            PersistenceError::Contract("schema drift".into()),
        );
        let session = store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();

        assert!(session.is_fasting);
        assert_eq!(session.start_time_millis, T);
        assert_eq!(session.fasting_goal_id, "20:4");
        assert_eq!(backend.stored().get_bool(keys::IS_FASTING).unwrap(), Some(true));
        assert!(matches!(
            sub.next().await.unwrap(),
            Err(StoreError::Persistence(PersistenceError::Contract(_)))
        ));
        assert!(store.latest().is_err());
    }

    #[tokio::test]
    async fn failed_write_is_not_published() {
        let (store, backend, _) = store_at(T).await;
        let mut sub = store.subscribe();
        sub.next().await.unwrap().unwrap();

        backend.fail_next_update(PersistenceError::Io("full".into()));
        let result = store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await;
        assert!(result.is_err());
        assert!(!store.latest().unwrap().is_fasting);

        store
            .apply_local(LocalMutation::ChangeGoal { goal_id: "20:4".into() })
            .await
            .unwrap();
        let next = sub.next().await.unwrap().unwrap();
        assert!(!next.is_fasting);
        assert_eq!(next.fasting_goal_id, "20:4");
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let backend = MemoryPersistence::new();
        let store = FastingStateStore::with_capacity(backend, ManualClock::new(T), 1).await;
        let mut sub = store.subscribe();

        for goal in ["12:12", "18:6", "20:4"] {
            store
                .apply_local(LocalMutation::ChangeGoal { goal_id: goal.into() })
                .await
                .unwrap();
        }

        sub.next().await.unwrap().unwrap();
        let newest = sub.next().await.unwrap().unwrap();
        assert_eq!(newest.fasting_goal_id, "20:4");
    }

    #[tokio::test]
    async fn refresh_publishes_external_changes() {
        let (store, backend, _) = store_at(T).await;
        let mut sub = store.subscribe();
        sub.next().await.unwrap().unwrap();

        // Another process writes to the shared backend.
        backend
            .update(Box::new(|prefs| prefs.set(keys::IS_FASTING, PrefValue::Bool(true))))
            .await
            .unwrap();

        store.refresh().await.unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_fasting);
    }

    #[tokio::test]
    async fn refresh_keeps_last_value_on_transient_load_failure() {
        let (store, backend, _) = store_at(T).await;
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();
        let mut sub = store.subscribe();
        sub.next().await.unwrap().unwrap();

        backend.fail_next_load(PersistenceError::Io("disk asleep".into()));
        assert!(store.refresh().await.unwrap().is_fasting);
        assert!(store.latest().unwrap().is_fasting);

        store
            .apply_local(LocalMutation::ChangeGoal { goal_id: "18:6".into() })
            .await
            .unwrap();
        let next = sub.next().await.unwrap().unwrap();
        assert!(next.is_fasting);
        assert_eq!(next.fasting_goal_id, "18:6");
    }

    #[tokio::test]
    async fn concurrent_writers_are_serialised() {
        let (store, _, clock) = store_at(T).await;
        let store = Arc::new(store);
        let mut sub = store.subscribe();
        sub.next().await.unwrap().unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            let clock = clock.clone();
            handles.push(tokio::spawn(async move {
                clock.advance(1);
                store
                    .apply_local(LocalMutation::Reschedule {
                        start_time_millis: T + i,
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut last_stamp = 0;
        for _ in 0..10 {
            let session = sub.next().await.unwrap().unwrap();
            assert!(session.last_updated_millis >= last_stamp);
            last_stamp = session.last_updated_millis;
        }
        assert_eq!(store.latest().unwrap(), store.snapshot().await.unwrap());
    }

    #[tokio::test]
    async fn stream_adapter_yields_values() {
        let (store, _, _) = store_at(T).await;
        let stream = store.subscribe().into_stream();
        store
            .apply_local(LocalMutation::Start { start_time_millis: T })
            .await
            .unwrap();

        let values: Vec<_> = stream.take(2).collect().await;
        assert!(!values[0].as_ref().unwrap().is_fasting);
        assert!(values[1].as_ref().unwrap().is_fasting);
    }

    #[tokio::test]
    async fn subscription_ends_when_store_drops() {
        let (store, _, _) = store_at(T).await;
        let mut sub = store.subscribe();
        drop(store);
        assert!(sub.next().await.unwrap().is_ok());
        assert!(sub.next().await.is_none());
    }
}
