//! Binary entrypoint: loads config, sets up logging, builds the Axum app and
//! serves the two form endpoints until Ctrl-C / SIGTERM.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{debug, error, info};

use quote_relay::{app, config::RelayConfig, email::AppState, logger::set_logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Load environment (.env is optional)
    dotenv().ok();

    // 2) Config, read once and passed down explicitly
    let config = RelayConfig::from_env().context("reading configuration")?;

    // 3) Logging
    set_logger(&config.log).map_err(|e| anyhow::anyhow!("logger setup failed: {e}"))?;

    // 4) App state (renderer + transport)
    let state = Arc::new(AppState::from_config(&config)?);
    if let Some(dir) = &config.templates_dir {
        debug!("Templates directory: {}", dir.display());
    }

    // 5) Bind address
    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.listen_port)
        .parse()
        .context("invalid LISTEN_ADDR/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on http://{addr}");

    // 6) Serve
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}
