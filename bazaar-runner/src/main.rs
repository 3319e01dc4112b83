use anyhow::Result;
use bazaar_core::{BazaarContext, Config};
use bazaar_dispatch::BatchDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tracing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Bazaar realtime core");

    let config = Config::from_env();
    let flush_interval = Duration::from_millis(config.dispatch.flush_interval_ms);
    let ctx = BazaarContext::new(config).await?;

    tracing::info!("Context initialized");

    let dispatcher = Arc::new(BatchDispatcher::new(ctx.registry.clone(), flush_interval));

    tokio::spawn(Arc::clone(&dispatcher).run());

    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = bazaar_logstream::run(ctx_clone, dispatcher).await {
            tracing::error!("Log consumer error: {}", e);
        }
    });

    // Gateway server runs in the main task
    tracing::info!("Starting gateway");
    bazaar_gateway::run(ctx).await?;

    Ok(())
}
