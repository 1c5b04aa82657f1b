//! # fast-core
//!
//! Pure logic for onefast (no I/O, instant tests).
//!
//! This crate implements the progress math, the elapsed-time ticker state
//! machine and the derived views consumers render, without any timers,
//! storage or transport.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Time is passed in explicitly (or read through the
//! [`Clock`] trait) so the same input always yields the same output.
//!
//! The actual I/O (persistence, sync, the periodic wait) is performed by
//! `fast-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod duration;
pub mod progress;
pub mod summary;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duration::{format_duration, whole_hours};
pub use progress::{fraction, percentage};
pub use summary::ProgressSummary;
pub use ticker::{elapsed_since, TickAction, TickInput, TickerState};
