//! Live elapsed-time readout.

use anyhow::Result;
use onefast_client::{ElapsedTimeTicker, StoreError};
use onefast_core::{format_duration, percentage, SystemClock};
use onefast_types::{goal_by_id, FastingSession};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::device::Device;

/// How often to look for writes made by other onefast processes.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Run the watch command until Ctrl-C.
pub async fn run(data_dir: &Path, offline: bool) -> Result<()> {
    let device = Device::open(data_dir, offline).await?;
    let store = device.repository().store();

    let ticker = ElapsedTimeTicker::spawn(
        device.repository().read(),
        SystemClock,
        device.config.ticker.interval(),
    );
    let mut elapsed = ticker.subscribe();
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);

    loop {
        tokio::select! {
            changed = elapsed.changed() => {
                if changed.is_err() {
                    break;
                }
                let millis = *elapsed.borrow_and_update();
                print!("\r{:<60}", render(millis, &store.latest()));
                std::io::stdout().flush()?;
            }
            _ = refresh.tick() => {
                if let Err(e) = store.refresh().await {
                    warn!(error = %e, "failed to refresh fasting state");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    println!();

    ticker.shutdown();
    device.finish().await;
    Ok(())
}

fn render(elapsed_millis: i64, session: &Result<FastingSession, StoreError>) -> String {
    match session {
        Ok(session) if session.is_active() => {
            let goal = goal_by_id(&session.fasting_goal_id);
            format!(
                "{}  {:>3}% of {}h",
                format_duration(elapsed_millis),
                percentage(elapsed_millis, goal.duration_millis),
                goal.duration_display()
            )
        }
        Ok(_) => "not fasting".to_string(),
        Err(e) => format!("unavailable: {}", e),
    }
}
