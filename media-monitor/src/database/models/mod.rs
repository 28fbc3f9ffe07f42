//! Database models for media-monitor.
//!
//! These models map directly to the database schema and handle
//! serialization/deserialization of JSON fields.

pub mod server;

pub use server::*;
