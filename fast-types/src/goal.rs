//! Preset fasting goals.
//!
//! The catalog is static. Lookups never fail: an unknown id resolves to the
//! default goal so a stale or mistyped id on one device cannot break another.

use serde::Serialize;

/// Identifier of the goal used when none (or an unknown one) is selected.
pub const DEFAULT_GOAL_ID: &str = "16:8";

const HOUR_MILLIS: i64 = 60 * 60 * 1000;

/// A named target fasting duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FastingGoal {
    /// Stable identifier, also what gets persisted and synced.
    pub id: &'static str,
    /// Target duration in milliseconds.
    pub duration_millis: i64,
    /// Human-readable label.
    pub label: &'static str,
}

impl FastingGoal {
    const fn hours(id: &'static str, hours: i64, label: &'static str) -> Self {
        Self {
            id,
            duration_millis: hours * HOUR_MILLIS,
            label,
        }
    }

    /// Whole target hours as display text, e.g. `"16"`.
    pub fn duration_display(&self) -> String {
        (self.duration_millis / HOUR_MILLIS).to_string()
    }
}

/// Every preset goal, in display order.
pub const PRESET_GOALS: &[FastingGoal] = &[
    FastingGoal::hours("circadian", 13, "Circadian Rhythm TRF"),
    FastingGoal::hours("12:12", 12, "12:12"),
    FastingGoal::hours("16:8", 16, "16:8"),
    FastingGoal::hours("18:6", 18, "18:6"),
    FastingGoal::hours("20:4", 20, "20:4"),
    FastingGoal::hours("36h", 36, "Monk Fast"),
];

/// Look up a goal by id, falling back to the default goal.
pub fn goal_by_id(id: &str) -> &'static FastingGoal {
    PRESET_GOALS
        .iter()
        .find(|goal| goal.id == id)
        .unwrap_or_else(default_goal)
}

/// Check whether `id` names a preset goal.
pub fn is_known_goal(id: &str) -> bool {
    PRESET_GOALS.iter().any(|goal| goal.id == id)
}

fn default_goal() -> &'static FastingGoal {
    // DEFAULT_GOAL_ID is the third preset; keep these in step.
    &PRESET_GOALS[2]
}
