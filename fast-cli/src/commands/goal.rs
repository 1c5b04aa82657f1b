//! Goal selection.

use anyhow::{bail, Result};
use onefast_types::{is_known_goal, PRESET_GOALS};
use std::path::Path;

use crate::device::Device;

/// Select goal `id`.
pub async fn set(data_dir: &Path, offline: bool, id: &str) -> Result<()> {
    if !is_known_goal(id) {
        bail!("Unknown goal '{}'. Run 'onefast goals' to see the presets.", id);
    }

    let device = Device::open(data_dir, offline).await?;
    let session = device.controller.change_goal(id).await?;
    println!("Goal set to {}", session.fasting_goal_id);

    device.finish().await;
    Ok(())
}

/// Print the preset goals.
pub fn list() {
    for goal in PRESET_GOALS {
        println!("{:<10} {:>3}h  {}", goal.id, goal.duration_display(), goal.label);
    }
}
