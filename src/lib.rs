pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod services;
pub mod settlement;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::db::{MarketStore, MemoryStore, PgStore};
use crate::events::MarketEvent;
use crate::exchange::Exchange;

#[derive(Clone)]
pub struct AppState {
    /// Present only when running against Postgres; used by the health check.
    pub db: Option<sqlx::PgPool>,
    pub config: AppConfig,
    pub exchange: Exchange,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl AppState {
    /// Wire an exchange over `store` with a fresh event bus.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MarketStore>,
        db: Option<sqlx::PgPool>,
        metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        let (events_tx, _) = broadcast::channel::<MarketEvent>(config.event_buffer.max(1));
        let exchange = Exchange::new(store, config.settlement(), events_tx);
        Self {
            db,
            config,
            exchange,
            metrics_handle,
        }
    }

    /// Build state from configuration: Postgres when `DATABASE_URL` is set
    /// (migrations applied on startup), in-memory otherwise.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let metrics_handle = crate::metrics::init_metrics();

        match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to database...");
                let pool = db::init_pool(url).await?;
                let store = PgStore::new(pool.clone());
                store.migrate().await?;
                tracing::info!("Database connected, migrations applied");
                Ok(Self::new(config, Arc::new(store), Some(pool), metrics_handle))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store (state is lost on restart)");
                Ok(Self::new(config, Arc::new(MemoryStore::new()), None, metrics_handle))
            }
        }
    }
}
