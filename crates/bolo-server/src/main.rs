use tracing::{info, warn};

use bolo_server::config::{Config, DEFAULT_JWT_SECRET};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bolo_server=debug,bolo_api=debug,bolo_gateway=debug,bolo_db=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.jwt_secret == DEFAULT_JWT_SECRET {
        warn!("BOLO_JWT_SECRET not set, using the development secret");
    }

    let state = bolo_server::build_state(&config).await?;
    let bot = state.pipeline.bot().clone();
    let app = bolo_server::router(state);

    let addr = config.bind_addr()?;
    info!("Bolo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drop replies still waiting on the generator or their delay
    bot.shutdown().await;
    info!("Bolo server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
