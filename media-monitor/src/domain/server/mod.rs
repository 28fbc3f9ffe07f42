//! Media server entity, settings and observed stats.

mod entity;
mod settings;
mod stats;

pub use entity::{MediaServer, ServerId};
pub use settings::{
    CommonSettings, EmbySettings, JellyfinSettings, MIN_POLL_INTERVAL_MINUTES, PlexSettings,
    ServerKind, ServerSettings,
};
pub use stats::{ResourceUsage, ServerStats, StreamDecision, StreamSession};
