use anyhow::Context;

use accessgate_api::app::{self, services::ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    accessgate_observability::init();

    let config = ServerConfig::from_env();
    let service = app::services::build_services(&config).await?;
    let router = app::build_app(service);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
