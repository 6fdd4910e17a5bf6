use anyhow::Context;

use innkeep_api::{AppConfig, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    innkeep_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let (router, services) = app::build_app(&config).context("failed to start notification pump")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.shutdown();
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
