//! Open a fast.

use anyhow::Result;
use onefast_core::{Clock, SystemClock};
use std::path::Path;

use super::{describe, StartTime};
use crate::device::Device;

/// Run the start command.
pub async fn run(data_dir: &Path, offline: bool, when: StartTime) -> Result<()> {
    let device = Device::open(data_dir, offline).await?;
    let now = SystemClock.now_millis();

    let current = device.repository().snapshot().await?;
    if current.is_active() {
        println!("Replacing the open fast ({})", describe(&current, now));
    }

    let session = match when {
        StartTime::Now => device.controller.start_now().await?,
        other => device.controller.start_at(other.resolve(now)?).await?,
    };
    println!("Started: {}", describe(&session, now));

    device.finish().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn start_now_opens_a_fast() {
        let dir = tempdir().unwrap();
        run(dir.path(), true, StartTime::Now).await.unwrap();

        let device = Device::open(dir.path(), true).await.unwrap();
        let session = device.repository().snapshot().await.unwrap();
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn backdated_start_is_stored() {
        let dir = tempdir().unwrap();
        run(dir.path(), true, StartTime::At(1_705_000_000_000))
            .await
            .unwrap();

        let device = Device::open(dir.path(), true).await.unwrap();
        let session = device.repository().snapshot().await.unwrap();
        assert_eq!(session.start_time_millis, 1_705_000_000_000);
    }

    #[tokio::test]
    async fn invalid_start_is_rejected_without_writing() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), true, StartTime::At(-5)).await.is_err());

        let device = Device::open(dir.path(), true).await.unwrap();
        assert!(!device.repository().snapshot().await.unwrap().is_fasting);
    }
}
