//! Media server entity.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ServerKind, ServerSettings, ServerStats};
use crate::Error;

/// Stable identifier of a media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(Uuid);

impl ServerId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ServerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::validation(format!("invalid server id '{}': {}", s, e)))
    }
}

/// A monitored media server: identity, configuration and last observed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaServer {
    pub id: ServerId,
    pub settings: ServerSettings,
    #[serde(default)]
    pub stats: ServerStats,
}

impl MediaServer {
    /// Create a new server with a fresh id and empty stats.
    pub fn new(settings: ServerSettings) -> Self {
        Self::with_id(ServerId::new(), settings)
    }

    /// Create a server with a known id and empty stats.
    pub fn with_id(id: ServerId, settings: ServerSettings) -> Self {
        Self {
            id,
            settings,
            stats: ServerStats::default(),
        }
    }

    pub fn kind(&self) -> ServerKind {
        self.settings.kind()
    }

    pub fn name(&self) -> &str {
        self.settings.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_enabled()
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval()
    }
}
