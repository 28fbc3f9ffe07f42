//! Media server repository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use crate::Result;
use crate::database::models::MediaServerDbModel;
use crate::domain::{MediaServer, ServerId};

/// Durable mapping from server id to server record.
///
/// Implementations must be safe for concurrent use: the monitor loop, on-demand
/// refreshes and external mutations may all call in from different tasks.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// All stored servers. An empty store yields an empty list.
    async fn list_all(&self) -> Result<Vec<MediaServer>>;
    async fn get(&self, id: ServerId) -> Result<Option<MediaServer>>;
    /// Insert or wholesale replace the record with the same id.
    async fn upsert(&self, server: &MediaServer) -> Result<()>;
    /// Remove a record. Deleting an unknown id is not an error.
    async fn delete(&self, id: ServerId) -> Result<()>;
}

/// SQLx implementation of ServerStore.
pub struct SqlxServerStore {
    pool: SqlitePool,
}

impl SqlxServerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServerStore for SqlxServerStore {
    async fn list_all(&self) -> Result<Vec<MediaServer>> {
        let rows = sqlx::query_as::<_, MediaServerDbModel>(
            "SELECT * FROM media_servers ORDER BY created_at, name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut servers = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.into_domain() {
                Ok(server) => servers.push(server),
                // One unreadable row must not hide every other server.
                Err(e) => warn!(server_id = %id, error = %e, "Skipping unreadable media server row"),
            }
        }
        Ok(servers)
    }

    async fn get(&self, id: ServerId) -> Result<Option<MediaServer>> {
        let row = sqlx::query_as::<_, MediaServerDbModel>("SELECT * FROM media_servers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(MediaServerDbModel::into_domain).transpose()
    }

    async fn upsert(&self, server: &MediaServer) -> Result<()> {
        let model = MediaServerDbModel::from_domain(server)?;
        sqlx::query(
            r#"
            INSERT INTO media_servers (id, kind, name, enabled, settings, stats, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                enabled = excluded.enabled,
                settings = excluded.settings,
                stats = excluded.stats,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&model.id)
        .bind(&model.kind)
        .bind(&model.name)
        .bind(model.enabled)
        .bind(&model.settings)
        .bind(&model.stats)
        .bind(model.created_at)
        .bind(model.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: ServerId) -> Result<()> {
        sqlx::query("DELETE FROM media_servers WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};
    use crate::domain::{
        CommonSettings, ResourceUsage, ServerKind, ServerSettings, StreamDecision, StreamSession,
    };

    async fn setup_store() -> SqlxServerStore {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxServerStore::new(pool)
    }

    fn plex(name: &str, enabled: bool) -> MediaServer {
        MediaServer::new(ServerSettings::plex(
            CommonSettings::new(name, "http://plex.local:32400").with_enabled(enabled),
            "token",
        ))
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let store = setup_store().await;
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = setup_store().await;
        let server = plex("Living room", true);

        store.upsert(&server).await.unwrap();

        let fetched = store.get(server.id).await.unwrap().unwrap();
        assert_eq!(fetched, server);
        assert!(store.get(ServerId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_wholesale() {
        let store = setup_store().await;
        let mut server = plex("Old name", false);
        store.upsert(&server).await.unwrap();

        server.settings.common_mut().name = "New name".to_string();
        server.settings.common_mut().enabled = true;
        server.stats.streams = vec![StreamSession::new(StreamDecision::DirectStream)];
        server.stats.resources = ResourceUsage {
            host_cpu_percent: 12.5,
            ..ResourceUsage::default()
        };
        store.upsert(&server).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], server);
        assert_eq!(all[0].name(), "New name");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = setup_store().await;
        let a = plex("A", true);
        let b = MediaServer::new(ServerSettings::jellyfin(CommonSettings::new("B", "http://jf")));
        store.upsert(&a).await.unwrap();
        store.upsert(&b).await.unwrap();

        store.delete(a.id).await.unwrap();
        // Unknown ids are ignored.
        store.delete(ServerId::new()).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind(), ServerKind::Jellyfin);
    }

    #[tokio::test]
    async fn test_unreadable_row_is_skipped() {
        let store = setup_store().await;
        let good = plex("Good", true);
        store.upsert(&good).await.unwrap();

        sqlx::query(
            "INSERT INTO media_servers (id, kind, name, enabled, settings, stats, created_at, updated_at) \
             VALUES ('broken', 'kodi', 'Broken', 1, '{\"kind\":\"kodi\"}', '{}', 0, 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, good.id);
    }
}
