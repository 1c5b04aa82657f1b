//! CLI command implementations.

pub mod edit;
pub mod goal;
pub mod listen;
pub mod start;
pub mod status;
pub mod stop;
pub mod watch;

use anyhow::{bail, Result};
use onefast_core::format_duration;
use onefast_types::{goal_by_id, FastingSession};

const MINUTE_MILLIS: i64 = 60_000;

/// When a fast started, as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTime {
    /// The current time.
    Now,
    /// This many minutes before now.
    MinutesAgo(u64),
    /// An explicit epoch-millisecond timestamp.
    At(i64),
}

impl StartTime {
    /// Build from the mutually exclusive `--ago` / `--at` flags.
    pub fn from_args(ago: Option<u64>, at: Option<i64>) -> Self {
        match (ago, at) {
            (Some(minutes), _) => Self::MinutesAgo(minutes),
            (None, Some(millis)) => Self::At(millis),
            (None, None) => Self::Now,
        }
    }

    /// Resolve to epoch milliseconds.
    pub fn resolve(self, now_millis: i64) -> Result<i64> {
        let millis = match self {
            Self::Now => now_millis,
            Self::MinutesAgo(minutes) => {
                let offset = i64::try_from(minutes)
                    .ok()
                    .and_then(|m| m.checked_mul(MINUTE_MILLIS));
                match offset {
                    Some(offset) => now_millis.saturating_sub(offset),
                    None => bail!("--ago {} is out of range", minutes),
                }
            }
            Self::At(millis) => millis,
        };
        if millis <= 0 {
            bail!("start time must be after the Unix epoch");
        }
        Ok(millis)
    }
}

/// One-line description of a session.
pub fn describe(session: &FastingSession, now_millis: i64) -> String {
    let goal = goal_by_id(&session.fasting_goal_id);
    if session.is_active() {
        let elapsed = now_millis.saturating_sub(session.start_time_millis);
        format!(
            "fasting for {} (goal {}, {}h)",
            format_duration(elapsed),
            goal.label,
            goal.duration_display()
        )
    } else {
        format!("not fasting (goal {}, {}h)", goal.label, goal.duration_display())
    }
}
