//! Show progress of the current fast.

use anyhow::Result;
use onefast_core::{format_duration, ProgressSummary};
use std::path::Path;

use crate::device::Device;

/// Run the status command.
pub async fn run(data_dir: &Path, json: bool) -> Result<()> {
    // Reading never needs the peer.
    let device = Device::open(data_dir, true).await?;
    let summary = device.controller.summary().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render(&summary));
    }

    device.finish().await;
    Ok(())
}

fn render(summary: &ProgressSummary) -> String {
    let goal = &summary.goal;
    if !summary.is_fasting {
        return format!(
            "Not fasting.\nGoal:      {} ({}h)\n",
            goal.label,
            goal.duration_display()
        );
    }

    let mut out = String::new();
    out.push_str(&format!("Goal:      {} ({}h)\n", goal.label, goal.duration_display()));
    out.push_str(&format!(
        "Elapsed:   {} ({}%)\n",
        format_duration(summary.elapsed_millis),
        summary.percentage
    ));
    if summary.goal_reached {
        out.push_str("Remaining: goal reached\n");
    } else {
        out.push_str(&format!(
            "Remaining: {}\n",
            format_duration(summary.remaining_millis)
        ));
    }
    out
}
