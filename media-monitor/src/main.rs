use std::sync::Arc;

use media_monitor::client::ClientRegistry;
use media_monitor::config::{self, AppConfig};
use media_monitor::database::{self, SqlxServerStore};
use media_monitor::logging;
use media_monitor::monitor::MonitorService;
use media_monitor::notification::LoggingNotifier;
use media_monitor::utils::http_client::build_http_client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = config::load_dotenv()?;
    let config = AppConfig::from_env()?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;
    if let Some(path) = env_file {
        debug!(path = %path.display(), "Loaded .env file");
    }

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let store = Arc::new(SqlxServerStore::new(pool.clone()));
    let clients = ClientRegistry::with_defaults(build_http_client(config.http_request_timeout));
    info!(kinds = ?clients.kinds(), "Refresh clients registered");

    let service = MonitorService::new(store, clients, config.monitor.clone());
    let notifier = Arc::new(LoggingNotifier::new());
    let listener = notifier.spawn_listener(service.bus().receiver(), shutdown.clone());

    let run = service.start(&shutdown);
    info!(run_id = %run.id(), "media-monitor initialized successfully");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");
    service.stop();
    run.wait().await;
    shutdown.cancel();
    let _ = listener.await;
    pool.close().await;

    Ok(())
}
