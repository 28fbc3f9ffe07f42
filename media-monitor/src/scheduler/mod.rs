//! Due-time scheduling for the monitor loop.
//!
//! The scheduler is pure bookkeeping: it never sleeps or performs I/O.
//! The control loop in [`crate::monitor`] owns one [`DueSchedule`] per run
//! and asks it which servers are due and how long it may sleep.

mod due;

pub use due::{DEFAULT_IDLE_INTERVAL, DEFAULT_MIN_WAKE_DELAY, DueSchedule};
