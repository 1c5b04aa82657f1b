//! The singleton fasting-session record.

use serde::{Deserialize, Serialize};

use crate::goal::DEFAULT_GOAL_ID;

/// Sentinel start time meaning "no fast has started".
pub const UNSET_START_TIME: i64 = -1;

/// Field names shared by the local record and the sync message.
pub mod keys {
    /// Whether a fast is currently open.
    pub const IS_FASTING: &str = "is_fasting";
    /// Start of the open fast, epoch milliseconds.
    pub const START_TIME: &str = "start_time";
    /// Selected goal identifier.
    pub const FASTING_GOAL_ID: &str = "fasting_goal_id";
    /// Timestamp of the last write, epoch milliseconds.
    pub const LAST_UPDATED: &str = "last_updated";
}

/// The fasting session kept on each device.
///
/// There is exactly one of these per device. "No session" is represented
/// by `is_fasting == false` with an unset start time, never by absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastingSession {
    /// True iff a fast is currently open.
    pub is_fasting: bool,
    /// Start of the open fast in epoch milliseconds, or [`UNSET_START_TIME`].
    pub start_time_millis: i64,
    /// Goal for the current (or next) fast.
    pub fasting_goal_id: String,
    /// When this record was last written, epoch milliseconds.
    pub last_updated_millis: i64,
}

impl FastingSession {
    /// True when the start time holds a real timestamp.
    ///
    /// The sentinel (and any non-positive value) is never a valid start.
    pub fn has_valid_start(&self) -> bool {
        self.start_time_millis > 0
    }

    /// True when a fast is open and has a usable start time.
    ///
    /// `is_fasting` can briefly be true before the start time lands; such a
    /// record is not treated as an active fast.
    pub fn is_active(&self) -> bool {
        self.is_fasting && self.has_valid_start()
    }
}

impl Default for FastingSession {
    fn default() -> Self {
        Self {
            is_fasting: false,
            start_time_millis: UNSET_START_TIME,
            fasting_goal_id: DEFAULT_GOAL_ID.to_string(),
            last_updated_millis: 0,
        }
    }
}
