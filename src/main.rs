use clap::Parser;
use liveline::api::{self, AppState};
use liveline::config::LoggingConfig;
use liveline::{
    AnalyticsEngine, AppConfig, EventBus, LivelineError, ModelRegistry, PostgresStore,
    RecordStore, ReplayManager, Result,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "liveline", about = "Live NFL win-probability replay engine")]
struct Cli {
    /// Configuration directory
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Override the HTTP listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Configuration error: {}", e);
        }
        return Err(LivelineError::Validation(errors.join("; ")));
    }

    let store = PostgresStore::new(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;

    // The model is optional at startup: the HTTP surface stays up so health
    // checks and analytics over existing history keep working, but replays
    // cannot start until a model is installed.
    let registry = Arc::new(ModelRegistry::new());
    if let Err(e) = registry.load_from_file(&config.model.path) {
        warn!(
            path = %config.model.path,
            "No win-probability model loaded; replays will be rejected: {}",
            e
        );
    }

    let bus = Arc::new(EventBus::new(
        config.replay.queue_capacity,
        Duration::from_secs(config.replay.latest_event_ttl_secs),
    ));
    let store: Arc<dyn RecordStore> = Arc::new(store);
    let manager = Arc::new(ReplayManager::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&bus),
        config.model.top_attributions,
    ));
    let analytics = Arc::new(AnalyticsEngine::new(Arc::clone(&store)));

    let state = AppState {
        manager,
        bus,
        analytics,
        registry,
        replay_config: config.replay.clone(),
        started_at: chrono::Utc::now(),
    };

    let port = cli.port.unwrap_or(config.server.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LivelineError::Internal(format!("server error: {e}")))?;

    info!("Shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
