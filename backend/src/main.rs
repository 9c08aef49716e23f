use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence_backend::{
    config::Config,
    db::connection::create_pool,
    handlers,
    services::FsEvidenceStore,
    state::{production_context, AppState},
    workers::spawn_background_workers,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        jwt_secret = %mask_secret(&config.jwt_secret),
        time_zone = %config.time_zone,
        bind_addr = %config.bind_addr,
        geofence_grace_minutes = config.geofence_grace_minutes,
        end_of_day_cutoff = %config.end_of_day_cutoff,
        webhook = config.notification_webhook_url.is_some(),
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let context = production_context(&config, pool)?;
    let evidence = Arc::new(FsEvidenceStore::new(config.evidence_dir.clone()));
    let state = AppState::new(config.clone(), context, evidence);

    let shutdown = CancellationToken::new();
    let workers = spawn_background_workers(
        state.worker_services(),
        config.worker_intervals(),
        shutdown.clone(),
    );

    let app = handlers::router(state.clone());

    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    workers.shutdown().await;
    state.context.notifier.wait_idle().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
