//! Monitor events.
//!
//! The control loop and the mutation hooks publish through a
//! [`MonitorEventBus`]. Observers registered with
//! [`MonitorEventBus::subscribe`] are called synchronously on the publishing
//! task; async consumers can take a broadcast [`MonitorEventBus::receiver`]
//! instead.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, trace};

use crate::domain::{MediaServer, ServerId};

/// Events emitted by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// A server was created, edited, or refreshed.
    ServerUpdated(MediaServer),
    /// A server was removed.
    ServerDeleted(ServerId),
    /// Number of enabled servers, published on every loop iteration and
    /// after each mutation.
    EnabledCountChanged(usize),
}

impl MonitorEvent {
    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            MonitorEvent::ServerUpdated(server) => {
                format!("{} updated ({} streams)", server.name(), server.stats.stream_count())
            }
            MonitorEvent::ServerDeleted(id) => format!("server {} deleted", id),
            MonitorEvent::EnabledCountChanged(count) => format!("{} servers enabled", count),
        }
    }
}

/// Synchronous event observer.
///
/// All methods default to no-ops so implementors only override what they
/// care about. Methods run on the publishing task and should return quickly.
pub trait MonitorObserver: Send + Sync {
    fn on_server_updated(&self, _server: &MediaServer) {}

    fn on_server_deleted(&self, _id: ServerId) {}

    fn on_enabled_count_changed(&self, _count: usize) {}
}

/// Handle returned by [`MonitorEventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out point for [`MonitorEvent`]s.
pub struct MonitorEventBus {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn MonitorObserver>)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<MonitorEvent>,
}

impl MonitorEventBus {
    /// Create a new bus with default broadcast capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new bus with the given broadcast capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Register an observer. Observers are called in registration order.
    pub fn subscribe(&self, observer: Arc<dyn MonitorObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Receive events asynchronously. Events published before this call are
    /// not replayed.
    pub fn receiver(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Number of registered observers plus live broadcast receivers.
    pub fn subscriber_count(&self) -> usize {
        self.observers.read().len() + self.sender.receiver_count()
    }

    pub fn publish_server_updated(&self, server: &MediaServer) {
        self.publish(MonitorEvent::ServerUpdated(server.clone()));
    }

    pub fn publish_server_deleted(&self, id: ServerId) {
        self.publish(MonitorEvent::ServerDeleted(id));
    }

    pub fn publish_enabled_count(&self, count: usize) {
        self.publish(MonitorEvent::EnabledCountChanged(count));
    }

    /// Deliver an event to every observer, then to broadcast receivers.
    pub fn publish(&self, event: MonitorEvent) {
        trace!(event = %event.description(), "Publishing monitor event");

        // Snapshot so observers may (un)subscribe from inside a callback.
        let observers: Vec<_> = self
            .observers
            .read()
            .iter()
            .map(|(id, observer)| (*id, observer.clone()))
            .collect();

        for (id, observer) in observers {
            let delivered = catch_unwind(AssertUnwindSafe(|| match &event {
                MonitorEvent::ServerUpdated(server) => observer.on_server_updated(server),
                MonitorEvent::ServerDeleted(server_id) => observer.on_server_deleted(*server_id),
                MonitorEvent::EnabledCountChanged(count) => {
                    observer.on_enabled_count_changed(*count)
                }
            }));
            if delivered.is_err() {
                error!(subscription = ?id, "Monitor observer panicked while handling event");
            }
        }

        // No receivers is not an error.
        let _ = self.sender.send(event);
    }
}

impl Default for MonitorEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonitorEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEventBus")
            .field("observers", &self.observers.read().len())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommonSettings, ServerSettings};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MonitorObserver for Recorder {
        fn on_server_updated(&self, server: &MediaServer) {
            self.log.lock().push(format!("{}:updated:{}", self.label, server.name()));
        }

        fn on_server_deleted(&self, _id: ServerId) {
            self.log.lock().push(format!("{}:deleted", self.label));
        }

        fn on_enabled_count_changed(&self, count: usize) {
            self.log.lock().push(format!("{}:count:{}", self.label, count));
        }
    }

    struct Panicker;

    impl MonitorObserver for Panicker {
        fn on_enabled_count_changed(&self, _count: usize) {
            panic!("observer failure");
        }
    }

    /// Only cares about deletions; the rest use the default no-ops.
    struct DeletesOnly(Arc<Mutex<usize>>);

    impl MonitorObserver for DeletesOnly {
        fn on_server_deleted(&self, _id: ServerId) {
            *self.0.lock() += 1;
        }
    }

    fn server(name: &str) -> MediaServer {
        MediaServer::new(ServerSettings::emby(CommonSettings::new(name, "http://emby")))
    }

    #[test]
    fn test_observers_called_in_registration_order() {
        let bus = MonitorEventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Recorder { label: "a", log: log.clone() }));
        bus.subscribe(Arc::new(Recorder { label: "b", log: log.clone() }));

        bus.publish_server_updated(&server("den"));
        bus.publish_enabled_count(2);

        assert_eq!(
            *log.lock(),
            vec!["a:updated:den", "b:updated:den", "a:count:2", "b:count:2"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let bus = MonitorEventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe(Arc::new(Recorder { label: "a", log: log.clone() }));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.publish_server_deleted(ServerId::new());
        assert!(log.lock().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let bus = MonitorEventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Panicker));
        bus.subscribe(Arc::new(Recorder { label: "a", log: log.clone() }));

        bus.publish_enabled_count(1);
        bus.publish_enabled_count(3);

        assert_eq!(*log.lock(), vec!["a:count:1", "a:count:3"]);
    }

    #[test]
    fn test_default_methods_are_noops() {
        let bus = MonitorEventBus::new();
        let deletes = Arc::new(Mutex::new(0));
        bus.subscribe(Arc::new(DeletesOnly(deletes.clone())));

        bus.publish_server_updated(&server("den"));
        bus.publish_enabled_count(4);
        bus.publish_server_deleted(ServerId::new());

        assert_eq!(*deletes.lock(), 1);
    }

    #[tokio::test]
    async fn test_receiver_gets_events_after_subscribe() {
        let bus = MonitorEventBus::new();
        // Nobody listening yet; must not fail.
        bus.publish_enabled_count(7);

        let mut rx = bus.receiver();
        let id = ServerId::new();
        bus.publish_server_deleted(id);

        assert_eq!(rx.recv().await.unwrap(), MonitorEvent::ServerDeleted(id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_description() {
        assert_eq!(
            MonitorEvent::EnabledCountChanged(3).description(),
            "3 servers enabled"
        );
        assert_eq!(
            MonitorEvent::ServerUpdated(server("den")).description(),
            "den updated (0 streams)"
        );
    }
}
