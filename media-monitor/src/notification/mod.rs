//! Notification consumers for monitor events.
//!
//! [`LoggingNotifier`] reports every monitor event through `tracing`. It can
//! be registered as a synchronous [`MonitorObserver`] or run as a background
//! listener on a broadcast receiver, which keeps logging off the monitor
//! loop's task.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{MediaServer, ServerId, StreamDecision};
use crate::monitor::{MonitorEvent, MonitorObserver};

/// Logs monitor events.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::ServerUpdated(server) => self.on_server_updated(server),
            MonitorEvent::ServerDeleted(id) => self.on_server_deleted(*id),
            MonitorEvent::EnabledCountChanged(count) => self.on_enabled_count_changed(*count),
        }
    }

    /// Log events from `rx` on a background task until `cancel` fires or the
    /// bus is dropped.
    pub fn spawn_listener(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<MonitorEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Monitor event listener shutting down");
                        break;
                    }
                    result = rx.recv() => {
                        match result {
                            Ok(event) => self.handle(&event),
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Monitor event listener lagged by {} events", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("Monitor event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}

impl MonitorObserver for LoggingNotifier {
    fn on_server_updated(&self, server: &MediaServer) {
        let stats = &server.stats;
        info!(
            server_id = %server.id,
            server = %server.name(),
            kind = %server.kind(),
            enabled = server.is_enabled(),
            streams = stats.stream_count(),
            transcode = stats.count(StreamDecision::Transcode),
            direct_stream = stats.count(StreamDecision::DirectStream),
            direct_play = stats.count(StreamDecision::DirectPlay),
            host_cpu = stats.resources.host_cpu_percent,
            process_cpu = stats.resources.process_cpu_percent,
            host_memory = stats.resources.host_memory_percent,
            process_memory = stats.resources.process_memory_percent,
            "Server updated"
        );
    }

    fn on_server_deleted(&self, id: ServerId) {
        info!(server_id = %id, "Server deleted");
    }

    fn on_enabled_count_changed(&self, count: usize) {
        debug!(enabled = count, "Enabled server count");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommonSettings, ServerSettings};
    use crate::monitor::MonitorEventBus;
    use std::time::Duration;

    fn server() -> MediaServer {
        MediaServer::new(ServerSettings::plex(
            CommonSettings::new("den", "http://plex.local"),
            "token",
        ))
    }

    #[test]
    fn test_handles_every_event() {
        let notifier = LoggingNotifier::new();
        notifier.handle(&MonitorEvent::ServerUpdated(server()));
        notifier.handle(&MonitorEvent::ServerDeleted(ServerId::new()));
        notifier.handle(&MonitorEvent::EnabledCountChanged(2));
    }

    #[test]
    fn test_registers_as_observer() {
        let bus = MonitorEventBus::new();
        let id = bus.subscribe(Arc::new(LoggingNotifier::new()));
        bus.publish_server_updated(&server());
        assert!(bus.unsubscribe(id));
    }

    #[tokio::test]
    async fn test_listener_stops_on_cancel() {
        let bus = MonitorEventBus::new();
        let cancel = CancellationToken::new();
        let handle = Arc::new(LoggingNotifier::new()).spawn_listener(bus.receiver(), cancel.clone());

        bus.publish_enabled_count(1);
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_listener_stops_when_bus_dropped() {
        let bus = MonitorEventBus::new();
        let handle =
            Arc::new(LoggingNotifier::new()).spawn_listener(bus.receiver(), CancellationToken::new());

        bus.publish_server_deleted(ServerId::new());
        drop(bus);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }
}
