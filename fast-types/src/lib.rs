//! # fast-types
//!
//! Data model and wire format for onefast.
//!
//! This crate provides the foundational types used across all onefast crates:
//! - [`FastingSession`] - The singleton session record kept on every device
//! - [`FastingGoal`] and [`goal_by_id`] - The preset goal catalog
//! - [`SessionPayload`] and [`DataItem`] - The device-to-device sync message
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod goal;
mod payload;
mod session;

pub use error::WireError;
pub use goal::{goal_by_id, is_known_goal, FastingGoal, DEFAULT_GOAL_ID, PRESET_GOALS};
pub use payload::{DataItem, SessionPayload, FASTING_PATH, MAX_PAYLOAD_SIZE};
pub use session::{keys, FastingSession, UNSET_START_TIME};
