use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use agrisk_infra::clock::{Clock, SystemClock};
use agrisk_infra::collaborators::{InMemoryReferenceData, PostgresReferenceData};
use agrisk_infra::config::{EngineConfig, RuntimeConfig, StoreBackend};
use agrisk_infra::services::AlertEngine;
use agrisk_infra::store::{InMemoryAlertStore, PostgresAlertStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppServices {
    engine: AlertEngine,
}

impl AppServices {
    pub fn new(engine: AlertEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }
}

/// Wire the engine against the backend selected by `USE_PERSISTENT_STORES`.
pub async fn build_services(runtime: &RuntimeConfig, config: EngineConfig) -> anyhow::Result<AppServices> {
    match &runtime.backend {
        StoreBackend::InMemory => {
            tracing::warn!("USE_PERSISTENT_STORES not set; alerts are kept in memory only");
            Ok(build_in_memory_services(
                config,
                Arc::new(InMemoryReferenceData::new()),
                Arc::new(SystemClock),
            ))
        }
        StoreBackend::Postgres { database_url } => build_persistent_services(config, database_url).await,
    }
}

/// In-memory wiring (dev/test). The caller keeps `data` to seed farms, lots and users.
pub fn build_in_memory_services(
    config: EngineConfig,
    data: Arc<InMemoryReferenceData>,
    clock: Arc<dyn Clock>,
) -> AppServices {
    let engine = AlertEngine::new(
        config,
        clock,
        data.clone(),
        data.clone(),
        data,
        Arc::new(InMemoryAlertStore::new()),
    );
    AppServices::new(engine)
}

async fn build_persistent_services(config: EngineConfig, database_url: &str) -> anyhow::Result<AppServices> {
    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to postgres")?;

    let store = PostgresAlertStore::new(pool.clone());
    store.migrate().await?;
    let reference = Arc::new(PostgresReferenceData::new(pool));

    tracing::info!("using postgres alert store");
    let engine = AlertEngine::new(
        config,
        Arc::new(SystemClock),
        reference.clone(),
        reference.clone(),
        reference,
        Arc::new(store),
    );
    Ok(AppServices::new(engine))
}
