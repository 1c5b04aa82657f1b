//! Elapsed-time ticker state machine.
//!
//! This module decides *what* the ticker emits; the periodic wait itself is
//! driven by fast-client. The machine has two states:
//!
//! ```text
//!            valid (fasting, start > 0)
//!   Idle ─────────────────────────────────► Ticking { start }
//!    ▲                                          │
//!    └──────────────────────────────────────────┘
//!      not fasting, or start unset/invalid
//! ```
//!
//! Every input (even an unchanged one) recomputes immediately from the
//! authoritative start time and restarts the cadence. Nothing is carried over
//! from a previous run, so resuming after Idle has no drift.

use onefast_types::FastingSession;

/// The part of a session the ticker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInput {
    /// Whether a fast is open.
    pub is_fasting: bool,
    /// Start of the fast, epoch milliseconds.
    pub start_time_millis: i64,
}

impl TickInput {
    /// Only an open fast with a real start time ticks.
    pub fn is_valid(&self) -> bool {
        self.is_fasting && self.start_time_millis > 0
    }
}

impl From<&FastingSession> for TickInput {
    fn from(session: &FastingSession) -> Self {
        Self {
            is_fasting: session.is_fasting,
            start_time_millis: session.start_time_millis,
        }
    }
}

/// Ticker state - NO timers, just transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickerState {
    /// Not fasting; output is pinned at zero.
    #[default]
    Idle,
    /// Fasting; output is `now - start`, clamped at zero.
    Ticking {
        /// Start of the fast, epoch milliseconds.
        start_time_millis: i64,
    },
}

/// Actions for the driver to execute, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Publish this elapsed value.
    Emit {
        /// Elapsed milliseconds (never negative).
        elapsed_millis: i64,
    },
    /// Drop any running cadence and start a fresh one.
    RestartCadence,
    /// Drop any running cadence.
    StopCadence,
}

impl TickerState {
    /// Create a ticker in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process a new upstream value.
    ///
    /// This is a pure function - the caller executes the returned actions.
    pub fn on_input(self, input: TickInput, now_millis: i64) -> (Self, Vec<TickAction>) {
        if input.is_valid() {
            let start_time_millis = input.start_time_millis;
            (
                Self::Ticking { start_time_millis },
                vec![
                    TickAction::Emit {
                        elapsed_millis: elapsed_since(start_time_millis, now_millis),
                    },
                    TickAction::RestartCadence,
                ],
            )
        } else {
            (
                Self::Idle,
                vec![
                    TickAction::Emit { elapsed_millis: 0 },
                    TickAction::StopCadence,
                ],
            )
        }
    }

    /// Process a cadence tick. Returns the value to emit, if any.
    pub fn on_tick(&self, now_millis: i64) -> Option<i64> {
        match self {
            Self::Idle => None,
            Self::Ticking { start_time_millis } => {
                Some(elapsed_since(*start_time_millis, now_millis))
            }
        }
    }

    /// Check if currently ticking.
    pub fn is_ticking(&self) -> bool {
        matches!(self, Self::Ticking { .. })
    }
}

/// `now - start`, clamped so clock skew or a future-dated edit reads as zero.
pub fn elapsed_since(start_time_millis: i64, now_millis: i64) -> i64 {
    now_millis.saturating_sub(start_time_millis).max(0)
}
