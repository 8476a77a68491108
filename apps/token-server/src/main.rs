//! Token endpoint for the Copilot widget.
//!
//! ```text
//! COPILOT_SECRET=... cargo run -p copilot-token-server
//! curl -X POST http://127.0.0.1:8090/api/copilot/token
//! ```

use anyhow::{Context, Result};
use copilot_widget_server::{ServerConfig, router_at};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env().context("loading token server configuration")?;
    let app = router_at(&config.token_route, config.options.clone());

    tracing::info!(
        bind = %config.bind,
        route = %config.token_route,
        "copilot token server listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
