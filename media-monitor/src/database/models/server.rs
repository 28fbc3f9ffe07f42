//! Media server database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::{MediaServer, ServerId, ServerKind, ServerSettings, ServerStats};
use crate::{Error, Result};

/// Media server database model.
///
/// Settings and stats are stored as JSON text; `kind`, `name` and `enabled`
/// are denormalized for filtering.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MediaServerDbModel {
    pub id: String,
    /// Server kind (plex, emby, jellyfin).
    pub kind: String,
    pub name: String,
    pub enabled: bool,
    /// JSON of [`ServerSettings`], tagged with `kind`.
    pub settings: String,
    /// JSON of [`ServerStats`].
    pub stats: String,
    /// Unix epoch milliseconds (UTC) when created.
    pub created_at: i64,
    /// Unix epoch milliseconds (UTC) when last updated.
    pub updated_at: i64,
}

impl MediaServerDbModel {
    /// Build a row from the domain entity.
    pub fn from_domain(server: &MediaServer) -> Result<Self> {
        let now = crate::database::time::now_ms();
        Ok(Self {
            id: server.id.to_string(),
            kind: server.kind().as_str().to_string(),
            name: server.name().to_string(),
            enabled: server.is_enabled(),
            settings: serde_json::to_string(&server.settings)?,
            stats: serde_json::to_string(&server.stats)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Convert the row back into the domain entity.
    pub fn into_domain(self) -> Result<MediaServer> {
        let id: ServerId = self.id.parse()?;
        let settings: ServerSettings = serde_json::from_str(&self.settings)?;

        let column_kind = ServerKind::parse(&self.kind)
            .ok_or_else(|| Error::store(format!("unknown server kind '{}'", self.kind)))?;
        if column_kind != settings.kind() {
            return Err(Error::store(format!(
                "server {} has kind '{}' but settings of kind '{}'",
                self.id,
                column_kind,
                settings.kind()
            )));
        }

        // Stats are a cache of the last refresh; unreadable stats are not fatal.
        let stats: ServerStats = serde_json::from_str(&self.stats).unwrap_or_default();

        Ok(MediaServer {
            id,
            settings,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommonSettings, StreamDecision, StreamSession};

    fn sample() -> MediaServer {
        let mut server = MediaServer::new(ServerSettings::plex(
            CommonSettings::new("Plex", "http://plex.local:32400").with_enabled(true),
            "token",
        ));
        server
            .stats
            .streams
            .push(StreamSession::new(StreamDecision::Transcode));
        server
    }

    #[test]
    fn test_domain_conversion() {
        let server = sample();
        let model = MediaServerDbModel::from_domain(&server).unwrap();
        assert_eq!(model.kind, "plex");
        assert!(model.enabled);

        let back = model.into_domain().unwrap();
        assert_eq!(back, server);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let mut model = MediaServerDbModel::from_domain(&sample()).unwrap();
        model.kind = "emby".to_string();
        assert!(matches!(model.into_domain(), Err(Error::Store(_))));
    }

    #[test]
    fn test_corrupt_stats_default_to_empty() {
        let mut model = MediaServerDbModel::from_domain(&sample()).unwrap();
        model.stats = "not json".to_string();
        let server = model.into_domain().unwrap();
        assert_eq!(server.stats, ServerStats::default());
    }
}
