//! Close the current fast.

use anyhow::Result;
use onefast_core::format_duration;
use std::path::Path;

use crate::device::Device;

/// Run the stop command.
pub async fn run(data_dir: &Path, offline: bool) -> Result<()> {
    let device = Device::open(data_dir, offline).await?;

    let summary = device.controller.summary().await?;
    if !summary.is_fasting {
        println!("No fast in progress.");
        device.finish().await;
        return Ok(());
    }

    device.controller.stop().await?;
    println!(
        "Fast ended after {} ({}% of the {}h goal{})",
        format_duration(summary.elapsed_millis),
        summary.percentage,
        summary.goal.duration_display(),
        if summary.goal_reached { ", reached" } else { "" }
    );

    device.finish().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{start, StartTime};
    use tempfile::tempdir;

    #[tokio::test]
    async fn stop_closes_fast_and_keeps_goal() {
        let dir = tempdir().unwrap();
        crate::commands::goal::set(dir.path(), true, "20:4").await.unwrap();
        start::run(dir.path(), true, StartTime::MinutesAgo(30))
            .await
            .unwrap();

        run(dir.path(), true).await.unwrap();

        let device = Device::open(dir.path(), true).await.unwrap();
        let session = device.repository().snapshot().await.unwrap();
        assert!(!session.is_fasting);
        assert_eq!(session.start_time_millis, -1);
        assert_eq!(session.fasting_goal_id, "20:4");
    }

    #[tokio::test]
    async fn stop_without_fast_is_a_no_op() {
        let dir = tempdir().unwrap();
        run(dir.path(), true).await.unwrap();

        let device = Device::open(dir.path(), true).await.unwrap();
        assert_eq!(device.repository().snapshot().await.unwrap().last_updated_millis, 0);
    }
}
