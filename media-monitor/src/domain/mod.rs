//! Domain layer for media-monitor.
//!
//! This module contains the media server entity and its value objects.

pub mod server;

pub use server::{
    CommonSettings, EmbySettings, JellyfinSettings, MIN_POLL_INTERVAL_MINUTES, MediaServer,
    PlexSettings, ResourceUsage, ServerId, ServerKind, ServerSettings, ServerStats,
    StreamDecision, StreamSession,
};
