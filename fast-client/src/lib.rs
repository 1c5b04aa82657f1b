//! # fast-client
//!
//! Fasting-state store, cross-device sync and elapsed-time ticker.
//!
//! This is the library presentation surfaces (phone app, watch app, CLI)
//! build on. Each device owns one [`FastingRepository`]; every consumer reads
//! through it instead of polling storage.
//!
//! ## Architecture
//!
//! ```text
//! user action ─► FastingRepository ─► FastingStateStore ─► Persistence
//!                     │                      │
//!                     ▼                      ▼ (fan-out)
//!              CrossDeviceSync        SessionSubscription ─► ElapsedTimeTicker
//!                     │
//!                     ▼
//!                 Transport ═══════► paired device ─► listener ─► store.apply_remote
//! ```
//!
//! Remote-origin updates enter through [`FastingStateStore::apply_remote`],
//! which has no access to the sync layer, so an inbound update can never be
//! echoed back to its sender.
//!
//! ## Example
//!
//! ```ignore
//! use onefast_client::{FastingRepository, FastingStateStore, MemoryPersistence};
//!
//! let store = FastingStateStore::open(MemoryPersistence::new(), clock).await;
//! let repository = FastingRepository::local_only(store);
//!
//! repository.start_fasting(now).await?;
//! let mut updates = repository.read();
//! while let Some(session) = updates.next().await {
//!     println!("{:?}", session?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod persistence;
pub mod repository;
pub mod store;
pub mod sync;
pub mod ticker;
pub mod transport;

pub use config::{Config, ConfigError, StoreConfig, SyncConfig, TickerConfig, CONFIG_FILE_NAME};
pub use controller::{FastingController, NotificationScheduler, TracingNotificationScheduler};
pub use error::{StoreError, SyncError};
pub use persistence::{
    MemoryPersistence, Persistence, PersistenceError, PrefValue, Preferences, SqlitePersistence,
};
pub use repository::FastingRepository;
pub use store::{
    FastingStateStore, LocalMutation, RemoteUpdate, SessionSubscription,
    DEFAULT_SUBSCRIBER_CAPACITY,
};
pub use sync::{decode_inbound, spawn_listener, CrossDeviceSync};
pub use ticker::ElapsedTimeTicker;
pub use transport::{LinkTransport, MockTransport, TcpTransport, Transport, TransportError};
