//! media-monitor library crate.
//!
//! Polls media servers for their live stream sessions and resource usage on
//! a per-server cadence and publishes change events to observers.

pub mod client;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
