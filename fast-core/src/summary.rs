//! One-shot progress view for surfaces that refresh on demand.
//!
//! Widgets and watch complications do not hold a ticker; they read a
//! snapshot, derive everything from it at the moment of the request, and
//! render.

use onefast_types::{goal_by_id, FastingGoal, FastingSession};
use serde::Serialize;

use crate::duration::whole_hours;
use crate::progress::{fraction, percentage};
use crate::ticker::elapsed_since;

/// Everything a surface needs to draw the current fast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    /// Whether a fast is active (open with a valid start).
    pub is_fasting: bool,
    /// Elapsed milliseconds, zero when idle.
    pub elapsed_millis: i64,
    /// The resolved goal (unknown ids resolve to the default).
    pub goal: FastingGoal,
    /// Progress fraction in `[0, 1]`.
    pub fraction: f64,
    /// Progress percentage in `[0, 100]`.
    pub percentage: u8,
    /// Whole elapsed hours.
    pub elapsed_hours: i64,
    /// Milliseconds left until the goal, zero once reached.
    pub remaining_millis: i64,
    /// True once elapsed meets the goal.
    pub goal_reached: bool,
}

impl ProgressSummary {
    /// Derive a summary from a session at time `now_millis`.
    pub fn from_session(session: &FastingSession, now_millis: i64) -> Self {
        let goal = *goal_by_id(&session.fasting_goal_id);
        let is_fasting = session.is_active();
        let elapsed_millis = if is_fasting {
            elapsed_since(session.start_time_millis, now_millis)
        } else {
            0
        };
        let goal_reached = is_fasting && elapsed_millis >= goal.duration_millis;

        Self {
            is_fasting,
            elapsed_millis,
            goal,
            fraction: fraction(elapsed_millis, goal.duration_millis),
            percentage: percentage(elapsed_millis, goal.duration_millis),
            elapsed_hours: whole_hours(elapsed_millis),
            remaining_millis: (goal.duration_millis - elapsed_millis).max(0),
            goal_reached,
        }
    }
}
