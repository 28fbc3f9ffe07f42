//! In-memory server store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::server::ServerStore;
use crate::Result;
use crate::domain::{MediaServer, ServerId};

/// Non-durable [`ServerStore`] keeping records in a map.
///
/// `list_all` returns servers in insertion order so iteration is stable.
#[derive(Default)]
pub struct MemoryServerStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    servers: HashMap<ServerId, MediaServer>,
    order: Vec<ServerId>,
}

impl MemoryServerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with servers.
    pub fn with_servers(servers: impl IntoIterator<Item = MediaServer>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for server in servers {
                inner.insert(server);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.inner.read().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn insert(&mut self, server: MediaServer) {
        if !self.servers.contains_key(&server.id) {
            self.order.push(server.id);
        }
        self.servers.insert(server.id, server);
    }
}

#[async_trait]
impl ServerStore for MemoryServerStore {
    async fn list_all(&self) -> Result<Vec<MediaServer>> {
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.servers.get(id).cloned())
            .collect())
    }

    async fn get(&self, id: ServerId) -> Result<Option<MediaServer>> {
        Ok(self.inner.read().servers.get(&id).cloned())
    }

    async fn upsert(&self, server: &MediaServer) -> Result<()> {
        self.inner.write().insert(server.clone());
        Ok(())
    }

    async fn delete(&self, id: ServerId) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.servers.remove(&id).is_some() {
            inner.order.retain(|existing| *existing != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommonSettings, ServerSettings};

    fn emby(name: &str) -> MediaServer {
        MediaServer::new(ServerSettings::emby(CommonSettings::new(name, "http://emby")))
    }

    #[tokio::test]
    async fn test_insertion_order_is_kept() {
        let a = emby("a");
        let b = emby("b");
        let c = emby("c");
        let store = MemoryServerStore::with_servers([a.clone(), b.clone(), c.clone()]);

        // Re-upserting does not move the record.
        store.upsert(&a).await.unwrap();

        let names: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_delete_and_get() {
        let a = emby("a");
        let store = MemoryServerStore::with_servers([a.clone()]);
        assert_eq!(store.get(a.id).await.unwrap(), Some(a.clone()));

        store.delete(a.id).await.unwrap();
        assert!(store.is_empty());
        assert!(store.get(a.id).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
