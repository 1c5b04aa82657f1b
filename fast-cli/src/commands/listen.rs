//! Accept paired devices and apply what they send.

use anyhow::{Context, Result};
use onefast_client::{spawn_listener, Config, TcpTransport};
use onefast_core::{Clock, SystemClock};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::describe;
use crate::device::open_store;

/// Run the listen command until Ctrl-C.
pub async fn run(data_dir: &Path, address: Option<String>) -> Result<()> {
    let config = Config::load_or_default(data_dir)?;
    let store = Arc::new(open_store(data_dir, &config).await?);

    let address = address.unwrap_or_else(|| config.sync.listen_address.clone());
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    println!("Listening on {}", listener.local_addr()?);

    let mut updates = store.subscribe();
    loop {
        tokio::select! {
            accepted = TcpTransport::accept(&listener) => match accepted {
                Ok(transport) => {
                    info!(peer = %transport.peer_addr(), "paired device connected");
                    spawn_listener(Arc::new(transport), store.clone());
                }
                Err(e) => warn!(error = %e, "failed to accept paired device"),
            },
            update = updates.next() => match update {
                Some(Ok(session)) => println!("{}", describe(&session, SystemClock.now_millis())),
                Some(Err(e)) => warn!(error = %e, "fasting state unavailable"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), Some("not-an-address".into())).await;
        assert!(result.is_err());
    }
}
