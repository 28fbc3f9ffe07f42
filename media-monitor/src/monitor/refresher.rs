//! Single-server status refresh.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::MonitorEventBus;
use crate::client::ClientRegistry;
use crate::database::ServerStore;
use crate::domain::{MediaServer, ServerStats};
use crate::{Error, Result};

/// Result of a successful [`StateRefresher::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// No client is registered for the server's kind; nothing was done.
    Unsupported,
    /// Fresh stats were fetched, persisted, and published.
    Refreshed(MediaServer),
    /// The server was deleted while its status was being fetched; nothing
    /// was saved or published.
    Removed,
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }
}

/// Fetches a server's live status, stores it, and announces it.
pub struct StateRefresher {
    store: Arc<dyn ServerStore>,
    clients: ClientRegistry,
    bus: Arc<MonitorEventBus>,
    /// Serializes store writes made on behalf of monitored servers.
    write_lock: Mutex<()>,
}

impl StateRefresher {
    pub fn new(
        store: Arc<dyn ServerStore>,
        clients: ClientRegistry,
        bus: Arc<MonitorEventBus>,
    ) -> Self {
        Self {
            store,
            clients,
            bus,
            write_lock: Mutex::new(()),
        }
    }

    /// Hold off refresh writes while the caller mutates the store.
    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Refresh one server.
    ///
    /// Stats are replaced wholesale with what the client reports and saved
    /// onto the record currently in the store, so settings written while the
    /// fetch was in flight are kept. On any error nothing is persisted and no
    /// event is published; cancellation surfaces as [`Error::Cancelled`].
    pub async fn refresh(
        &self,
        server: &MediaServer,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome> {
        let Some(client) = self.clients.get(server.kind()) else {
            debug!(
                server_id = %server.id,
                kind = %server.kind(),
                "No refresh client for server kind, skipping"
            );
            return Ok(RefreshOutcome::Unsupported);
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let streams = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            streams = client.fetch_stream_sessions(&server.settings, cancel) => streams?,
        };
        let resources = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            resources = client.fetch_resource_usage(&server.settings, cancel) => resources?,
        };

        let _guard = self.lock_writes().await;
        let Some(mut refreshed) = self.store.get(server.id).await? else {
            debug!(server_id = %server.id, "Server removed during refresh, discarding status");
            return Ok(RefreshOutcome::Removed);
        };
        refreshed.stats = ServerStats::new(streams, resources);

        self.store.upsert(&refreshed).await?;
        self.bus.publish_server_updated(&refreshed);

        debug!(
            server_id = %refreshed.id,
            streams = refreshed.stats.stream_count(),
            "Server refreshed"
        );

        Ok(RefreshOutcome::Refreshed(refreshed))
    }
}

impl std::fmt::Debug for StateRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRefresher")
            .field("clients", &self.clients)
            .finish_non_exhaustive()
    }
}
