//! # Edge Gateway - Main Entry Point
//!
//! Loads configuration from the environment, builds the gateway pipeline,
//! and serves until SIGTERM/SIGINT. Any missing or invalid required
//! configuration value aborts startup with the full list of problems.

use anyhow::Context;
use tracing::info;

use edge_gateway::{GatewayConfig, GatewayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("🚀 Starting edge gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::from_env().context("failed to load gateway configuration")?;

    info!(
        routes = config.routes.len(),
        port = config.server.port,
        "configuration loaded"
    );
    for upstream in config.upstreams.iter() {
        info!(name = %upstream.name, url = %upstream.base_url, "upstream configured");
    }

    let server = GatewayServer::new(&config).context("failed to build gateway server")?;
    server.start().await.context("gateway server failed")?;

    info!("gateway shutdown complete");
    Ok(())
}

/// Initialize logging with an env-filter override
///
/// `RUST_LOG` controls verbosity; the default keeps gateway and request
/// traces at info level.
fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edge_gateway=info,tower_http=info".into()),
        )
        .init();
}
