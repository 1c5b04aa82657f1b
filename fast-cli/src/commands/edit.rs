//! Move the start of the current fast.

use anyhow::Result;
use onefast_core::{Clock, SystemClock};
use std::path::Path;

use super::{describe, StartTime};
use crate::device::Device;

/// Run the edit-start command.
pub async fn run(data_dir: &Path, offline: bool, when: StartTime) -> Result<()> {
    let now = SystemClock.now_millis();
    let start = when.resolve(now)?;

    let device = Device::open(data_dir, offline).await?;
    let session = device.controller.edit_start(start).await?;
    if session.is_fasting {
        println!("Start moved: {}", describe(&session, now));
    } else {
        println!("Start time saved for the next fast.");
    }

    device.finish().await;
    Ok(())
}
