use std::sync::Arc;

use anyhow::Context;

use agrisk_infra::config::{EngineConfig, RuntimeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agrisk_observability::init();

    let runtime = RuntimeConfig::from_env().context("invalid runtime configuration")?;
    let config = EngineConfig::from_env().context("invalid engine configuration")?;

    let services = agrisk_api::app::services::build_services(&runtime, config).await?;
    let app = agrisk_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(runtime.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", runtime.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
