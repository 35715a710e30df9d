// Initialization utilities
//
// Store backend and logging/tracing setup

use crate::store::{LinkStore, MemoryStore, RedisStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use yo9gag_config::{LogConfig, LogFormat, RuntimeConfig, StoreBackend, StoreConfig};

/// Connect the configured store backend and bind it to the key names
pub async fn init_store(config: &StoreConfig) -> Result<LinkStore> {
    info!("Initializing store with backend: {}", config.backend);

    match config.backend {
        StoreBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("redis config required for redis backend"))?;
            let backend = RedisStore::connect(&redis.url, redis.connect_max_attempts)
                .await
                .context("Failed to initialize redis store")?;
            Ok(LinkStore::new(Arc::new(backend), config.keys.clone()))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on exit and not shared between processes");
            Ok(LinkStore::new(
                Arc::new(MemoryStore::new()),
                config.keys.clone(),
            ))
        }
    }
}

/// Initialize tracing/logging from the log configuration
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

/// Log non-fatal configuration findings; call after [`init_tracing`]
pub fn log_config_warnings(config: &RuntimeConfig) {
    for warning in config.warnings() {
        warn!("{}", warning);
    }
}
