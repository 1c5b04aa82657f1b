//! Wiring for one local device: config, database, optional peer.

use anyhow::{Context, Result};
use onefast_client::{
    spawn_listener, Config, CrossDeviceSync, FastingController, FastingRepository,
    FastingStateStore, SqlitePersistence, TcpTransport, TracingNotificationScheduler,
};
use onefast_core::SystemClock;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Controller type the commands work with.
pub type Controller = FastingController<SqlitePersistence, TracingNotificationScheduler>;

/// An opened device.
pub struct Device {
    /// High-level fasting actions.
    pub controller: Controller,
    /// Loaded configuration.
    pub config: Config,
    listener: Option<JoinHandle<()>>,
}

impl Device {
    /// Open the device in `data_dir`, dialing the paired device unless
    /// `offline` is set or none is configured.
    pub async fn open(data_dir: &Path, offline: bool) -> Result<Self> {
        let config = Config::load_or_default(data_dir)?;
        let store = open_store(data_dir, &config).await?;

        let (repository, listener) = match connect_peer(&config, offline).await {
            Some(transport) => {
                let transport = Arc::new(transport);
                let repository =
                    FastingRepository::new(store, CrossDeviceSync::spawn(transport.clone()));
                let listener = spawn_listener(transport, repository.store());
                (repository, Some(listener))
            }
            None => (FastingRepository::local_only(store), None),
        };

        let controller = FastingController::new(
            Arc::new(repository),
            TracingNotificationScheduler,
            SystemClock,
        );

        Ok(Self {
            controller,
            config,
            listener,
        })
    }

    /// The underlying repository.
    pub fn repository(&self) -> &FastingRepository<SqlitePersistence> {
        self.controller.repository()
    }

    /// Hand pending updates to the peer and stop listening.
    pub async fn finish(self) {
        self.repository().flush().await;
        if let Some(listener) = self.listener {
            listener.abort();
        }
    }
}

/// Open the SQLite-backed store configured for `data_dir`.
pub async fn open_store(
    data_dir: &Path,
    config: &Config,
) -> Result<FastingStateStore<SqlitePersistence>> {
    let path = config.store.database_path(data_dir);
    let persistence = SqlitePersistence::new(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(FastingStateStore::with_capacity(
        persistence,
        SystemClock,
        config.store.subscriber_capacity,
    )
    .await)
}

async fn connect_peer(config: &Config, offline: bool) -> Option<TcpTransport> {
    if offline {
        return None;
    }
    let address = config.sync.active_peer()?;
    match TcpTransport::connect(address, config.sync.connect_timeout()).await {
        Ok(transport) => {
            info!(peer = address, "connected to paired device");
            Some(transport)
        }
        Err(e) => {
            warn!(peer = address, error = %e, "paired device unreachable, continuing offline");
            None
        }
    }
}
