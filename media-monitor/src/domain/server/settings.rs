//! Per-kind media server settings.
//!
//! Settings are a tagged union keyed by [`ServerKind`]. The kind is derived
//! from the variant itself, so a server's kind can never drift from the shape
//! of its settings.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound for the poll interval, in minutes.
///
/// Zero or negative configured values are floored to this.
pub const MIN_POLL_INTERVAL_MINUTES: i32 = 1;

/// Kind of media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Plex,
    Emby,
    Jellyfin,
}

impl ServerKind {
    /// All known kinds.
    pub const ALL: [ServerKind; 3] = [ServerKind::Plex, ServerKind::Emby, ServerKind::Jellyfin];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plex => "plex",
            Self::Emby => "emby",
            Self::Jellyfin => "jellyfin",
        }
    }

    /// Parse from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plex" => Some(Self::Plex),
            "emby" => Some(Self::Emby),
            "jellyfin" => Some(Self::Jellyfin),
            _ => None,
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every server kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    /// Display name.
    pub name: String,
    /// Base address, e.g. `http://192.168.1.10:32400`.
    pub address: String,
    /// Host memory capacity in GiB, informational only.
    pub host_memory_capacity: i64,
    /// Whether the server takes part in scheduled refreshes.
    pub enabled: bool,
    /// Requested poll cadence in minutes.
    pub poll_interval_minutes: i32,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            address: String::new(),
            host_memory_capacity: 0,
            enabled: false,
            poll_interval_minutes: MIN_POLL_INTERVAL_MINUTES,
        }
    }
}

impl CommonSettings {
    /// Create settings with a name and address, disabled by default.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    /// Enable or disable scheduled refreshes.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the requested poll interval in minutes.
    pub fn with_poll_interval_minutes(mut self, minutes: i32) -> Self {
        self.poll_interval_minutes = minutes;
        self
    }

    /// Effective poll interval, floored at [`MIN_POLL_INTERVAL_MINUTES`].
    pub fn poll_interval(&self) -> Duration {
        let minutes = self.poll_interval_minutes.max(MIN_POLL_INTERVAL_MINUTES) as u64;
        Duration::from_secs(minutes * 60)
    }
}

/// Plex Media Server settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlexSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// `X-Plex-Token` used for every request.
    #[serde(default)]
    pub token: String,
}

/// Emby settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmbySettings {
    #[serde(flatten)]
    pub common: CommonSettings,
}

/// Jellyfin settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JellyfinSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
}

/// Settings of a media server, one variant per [`ServerKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServerSettings {
    Plex(PlexSettings),
    Emby(EmbySettings),
    Jellyfin(JellyfinSettings),
}

impl ServerSettings {
    /// Plex settings with the given common settings and token.
    pub fn plex(common: CommonSettings, token: impl Into<String>) -> Self {
        Self::Plex(PlexSettings {
            common,
            token: token.into(),
        })
    }

    pub fn emby(common: CommonSettings) -> Self {
        Self::Emby(EmbySettings { common })
    }

    pub fn jellyfin(common: CommonSettings) -> Self {
        Self::Jellyfin(JellyfinSettings { common })
    }

    /// Default (empty, disabled) settings for a kind.
    pub fn default_for(kind: ServerKind) -> Self {
        match kind {
            ServerKind::Plex => Self::Plex(PlexSettings::default()),
            ServerKind::Emby => Self::Emby(EmbySettings::default()),
            ServerKind::Jellyfin => Self::Jellyfin(JellyfinSettings::default()),
        }
    }

    /// The kind this variant belongs to.
    pub fn kind(&self) -> ServerKind {
        match self {
            Self::Plex(_) => ServerKind::Plex,
            Self::Emby(_) => ServerKind::Emby,
            Self::Jellyfin(_) => ServerKind::Jellyfin,
        }
    }

    pub fn common(&self) -> &CommonSettings {
        match self {
            Self::Plex(s) => &s.common,
            Self::Emby(s) => &s.common,
            Self::Jellyfin(s) => &s.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonSettings {
        match self {
            Self::Plex(s) => &mut s.common,
            Self::Emby(s) => &mut s.common,
            Self::Jellyfin(s) => &mut s.common,
        }
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn address(&self) -> &str {
        &self.common().address
    }

    pub fn is_enabled(&self) -> bool {
        self.common().enabled
    }

    pub fn poll_interval(&self) -> Duration {
        self.common().poll_interval()
    }

    /// Plex-specific settings, if this is a Plex server.
    pub fn as_plex(&self) -> Option<&PlexSettings> {
        match self {
            Self::Plex(s) => Some(s),
            _ => None,
        }
    }
}
