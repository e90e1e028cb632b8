use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crm_query_adapter::api;
use crm_query_adapter::config::Config;
use crm_query_adapter::services::transport::RestTransport;
use crm_query_adapter::services::CrmAdapter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let transport = RestTransport::new().context("Failed to create REST transport")?;
    let adapter = CrmAdapter::new(Arc::new(transport));

    // Register every configured data source; sessions are opened on first use
    for source in &config.sources {
        let (session_config, collections) = source
            .to_registration(&config.adapter)
            .with_context(|| format!("Invalid configuration for source '{}'", source.identity))?;

        adapter
            .register(&source.identity, session_config, collections)
            .await
            .map_err(|e| {
                error!("Failed to register data source '{}': {}", source.identity, e);
                e
            })?;
    }

    info!("Registered {} data sources", config.sources.len());

    let app: Router = api::routes::create_router_with_state(adapter);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
