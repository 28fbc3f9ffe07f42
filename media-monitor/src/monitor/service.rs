//! Media server monitor service.
//!
//! Drives a single background loop that refreshes enabled servers as they
//! become due, and exposes the mutation hooks that keep the loop and event
//! subscribers in sync with out-of-band configuration changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{MonitorEventBus, MonitorObserver, SubscriptionId};
use super::refresher::{RefreshOutcome, StateRefresher};
use crate::client::ClientRegistry;
use crate::database::ServerStore;
use crate::domain::{MediaServer, ServerId};
use crate::scheduler::{DEFAULT_IDLE_INTERVAL, DEFAULT_MIN_WAKE_DELAY, DueSchedule};
use crate::{Error, Result};

/// Configuration for the monitor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Sleep between iterations while no server is enabled.
    pub idle_interval: Duration,
    /// Lower bound on the sleep between iterations.
    pub min_wake_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            min_wake_delay: DEFAULT_MIN_WAKE_DELAY,
        }
    }
}

/// Lifecycle state of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
    /// Cancellation requested; the loop has not exited yet.
    Stopping,
}

/// Handle to one execution of the monitor loop.
#[derive(Debug)]
pub struct MonitorRun {
    id: Uuid,
    cancel: CancellationToken,
    done: CancellationToken,
    /// Nudges this run's loop out of its sleep.
    wake: Notify,
}

impl MonitorRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Request the loop to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the loop task has exited.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }
}

/// State shared between the service and its loop task.
struct Shared {
    store: Arc<dyn ServerStore>,
    refresher: StateRefresher,
    bus: Arc<MonitorEventBus>,
    config: MonitorConfig,
}

/// Keeps server stats fresh and publishes changes.
///
/// Cloning is not supported; share the service behind an `Arc`.
pub struct MonitorService {
    shared: Arc<Shared>,
    run: Mutex<Option<Arc<MonitorRun>>>,
}

impl MonitorService {
    pub fn new(store: Arc<dyn ServerStore>, clients: ClientRegistry, config: MonitorConfig) -> Self {
        Self::with_bus(store, clients, Arc::new(MonitorEventBus::new()), config)
    }

    /// Create a service publishing to an existing bus.
    pub fn with_bus(
        store: Arc<dyn ServerStore>,
        clients: ClientRegistry,
        bus: Arc<MonitorEventBus>,
        config: MonitorConfig,
    ) -> Self {
        let refresher = StateRefresher::new(store.clone(), clients, bus.clone());
        Self {
            shared: Arc::new(Shared {
                store,
                refresher,
                bus,
                config,
            }),
            run: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &Arc<MonitorEventBus> {
        &self.shared.bus
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Register an observer on the service's event bus.
    pub fn subscribe(&self, observer: Arc<dyn MonitorObserver>) -> SubscriptionId {
        self.shared.bus.subscribe(observer)
    }

    /// Start the loop as a child of `parent`.
    ///
    /// While a previous run has not exited (including one that is stopping)
    /// the same run is returned and nothing new is spawned. Each new run
    /// starts from an empty schedule, so every enabled server is refreshed
    /// right away.
    pub fn start(&self, parent: &CancellationToken) -> Arc<MonitorRun> {
        let mut current = self.run.lock();
        if let Some(run) = current.as_ref()
            && !run.is_finished()
        {
            return run.clone();
        }

        let run = Arc::new(MonitorRun {
            id: Uuid::new_v4(),
            cancel: parent.child_token(),
            done: CancellationToken::new(),
            wake: Notify::new(),
        });

        let shared = self.shared.clone();
        let task_run = run.clone();
        tokio::spawn(async move {
            // Marks the run finished even if the loop panics.
            let _done = task_run.done.clone().drop_guard();
            info!(run_id = %task_run.id, "Media server monitor started");
            shared.run_loop(&task_run).await;
            info!(run_id = %task_run.id, "Media server monitor stopped");
        });

        *current = Some(run.clone());
        run
    }

    /// Request the current run to stop. Never blocks; a no-op when stopped.
    pub fn stop(&self) {
        if let Some(run) = self.run.lock().as_ref() {
            run.cancel();
        }
    }

    pub fn state(&self) -> MonitorState {
        match self.run.lock().as_ref() {
            None => MonitorState::Stopped,
            Some(run) if run.is_finished() => MonitorState::Stopped,
            Some(run) if run.is_cancelled() => MonitorState::Stopping,
            Some(_) => MonitorState::Running,
        }
    }

    /// The most recent run, finished or not.
    pub fn current_run(&self) -> Option<Arc<MonitorRun>> {
        self.run.lock().clone()
    }

    /// Create or replace a server.
    ///
    /// Publishes the update and the new enabled count, then wakes the loop.
    /// A server's kind cannot change once it exists.
    pub async fn upsert_server(&self, server: MediaServer) -> Result<MediaServer> {
        let _guard = self.shared.refresher.lock_writes().await;
        if let Some(existing) = self.shared.store.get(server.id).await?
            && existing.kind() != server.kind()
        {
            return Err(Error::validation(format!(
                "server {} is a {} server and cannot become {}",
                server.id,
                existing.kind(),
                server.kind()
            )));
        }

        self.shared.store.upsert(&server).await?;
        debug!(server_id = %server.id, enabled = server.is_enabled(), "Server upserted");

        self.shared.bus.publish_server_updated(&server);
        self.announce_change().await;
        Ok(server)
    }

    /// Remove a server. Deleting an unknown id still notifies subscribers.
    pub async fn delete_server(&self, id: ServerId) -> Result<()> {
        let _guard = self.shared.refresher.lock_writes().await;
        self.shared.store.delete(id).await?;
        debug!(server_id = %id, "Server deleted");

        self.shared.bus.publish_server_deleted(id);
        self.announce_change().await;
        Ok(())
    }

    /// Refresh one server immediately, outside the loop's schedule.
    pub async fn refresh_server(
        &self,
        id: ServerId,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome> {
        let server = self
            .shared
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found("MediaServer", id.to_string()))?;
        self.shared.refresher.refresh(&server, cancel).await
    }

    /// Number of enabled servers; zero if the store cannot be read.
    pub async fn enabled_count(&self) -> usize {
        self.shared.enabled_servers().await.len()
    }

    /// Publish the enabled count, then wake the loop if one is running.
    async fn announce_change(&self) {
        let count = self.enabled_count().await;
        self.shared.bus.publish_enabled_count(count);
        if let Some(run) = self.run.lock().as_ref() {
            run.wake.notify_one();
        }
    }
}

impl Shared {
    async fn enabled_servers(&self) -> Vec<MediaServer> {
        match self.store.list_all().await {
            Ok(servers) => servers.into_iter().filter(|s| s.is_enabled()).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load servers, treating as none enabled");
                Vec::new()
            }
        }
    }

    async fn run_loop(&self, run: &MonitorRun) {
        let cancel = &run.cancel;
        let mut schedule = DueSchedule::new(self.config.idle_interval, self.config.min_wake_delay);

        while !cancel.is_cancelled() {
            let enabled = self.enabled_servers().await;
            self.bus.publish_enabled_count(enabled.len());

            schedule.reconcile(enabled.iter().map(|s| s.id), Instant::now());

            let servers: HashMap<ServerId, &MediaServer> =
                enabled.iter().map(|s| (s.id, s)).collect();

            for id in schedule.due(Instant::now()) {
                if cancel.is_cancelled() {
                    return;
                }
                let Some(server) = servers.get(&id) else {
                    continue;
                };

                match self.refresher.refresh(server, cancel).await {
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() && cancel.is_cancelled() => return,
                    Err(e) => {
                        warn!(
                            server_id = %id,
                            server = %server.name(),
                            error = %e,
                            "Failed to refresh server"
                        );
                    }
                }

                schedule.advance(id, server.poll_interval(), Instant::now());
            }

            let delay = schedule.next_wake(Instant::now());
            debug!(
                enabled = enabled.len(),
                delay_ms = delay.as_millis() as u64,
                "Monitor sleeping"
            );

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = run.wake.notified() => {
                    debug!("Monitor woken by server change");
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for MonitorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorService")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
