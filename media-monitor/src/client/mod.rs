//! Refresh clients for media servers.
//!
//! A [`MediaServerClient`] turns a server's settings into its current stream
//! sessions and resource usage. Clients are looked up by [`ServerKind`] through
//! a [`ClientRegistry`]; kinds without a registered client are unsupported and
//! skipped by the refresher.

mod plex;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::domain::{ResourceUsage, ServerKind, ServerSettings, StreamSession};

pub use plex::PlexClient;

/// Fetches live status from one kind of media server.
///
/// Both operations must honor `cancel` and return [`crate::Error::Cancelled`]
/// when it fires. A server reporting nothing yields an empty list or zeroed
/// usage, never an error.
#[async_trait]
pub trait MediaServerClient: Send + Sync + 'static {
    /// The server kind this client understands.
    fn kind(&self) -> ServerKind;

    async fn fetch_stream_sessions(
        &self,
        settings: &ServerSettings,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamSession>>;

    async fn fetch_resource_usage(
        &self,
        settings: &ServerSettings,
        cancel: &CancellationToken,
    ) -> Result<ResourceUsage>;
}

/// Lookup table from server kind to client.
#[derive(Default, Clone)]
pub struct ClientRegistry {
    clients: HashMap<ServerKind, Arc<dyn MediaServerClient>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in client, sharing one HTTP client.
    pub fn with_defaults(http: reqwest::Client) -> Self {
        Self::new().with(PlexClient::new(http))
    }

    /// Register a client, replacing any previous client for the same kind.
    pub fn register(&mut self, client: Arc<dyn MediaServerClient>) {
        self.clients.insert(client.kind(), client);
    }

    /// Builder-style [`Self::register`].
    pub fn with(mut self, client: impl MediaServerClient) -> Self {
        self.register(Arc::new(client));
        self
    }

    /// The client for a kind, or `None` if the kind is unsupported.
    pub fn get(&self, kind: ServerKind) -> Option<Arc<dyn MediaServerClient>> {
        self.clients.get(&kind).cloned()
    }

    pub fn supports(&self, kind: ServerKind) -> bool {
        self.clients.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ServerKind> {
        let mut kinds: Vec<_> = self.clients.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
