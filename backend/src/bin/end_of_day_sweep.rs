use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence_backend::{
    config::Config, db::connection::create_pool, services::EndOfDaySweeper,
    state::production_context,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;
    let context = production_context(&config, pool)?;

    let report = EndOfDaySweeper::new(context.clone()).run_once().await?;
    context.notifier.wait_idle().await;

    tracing::info!(
        closed = report.closed,
        failed = report.failed,
        branches = report.per_branch.len(),
        "End-of-day sweep complete"
    );
    if report.failed > 0 {
        anyhow::bail!("{} records could not be closed", report.failed);
    }
    Ok(())
}
