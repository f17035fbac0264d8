use std::sync::Arc;

use tracing::info;

use orchestrator_config::StoreConfig;
use orchestrator_domain::GraphStore;
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::memory::InMemoryGraphStore;
use crate::redis_store::RedisGraphStore;

/// 按 URL scheme 选择存储后端。
pub async fn create_store(config: &StoreConfig) -> OrchestratorResult<Arc<dyn GraphStore>> {
    if config.url.starts_with("memory://") {
        info!("using in-memory graph store");
        return Ok(Arc::new(InMemoryGraphStore::new()));
    }
    if config.url.starts_with("redis://") || config.url.starts_with("rediss://") {
        info!(url = %config.url, "using Redis graph store");
        let store = RedisGraphStore::connect(config.clone()).await?;
        return Ok(Arc::new(store));
    }
    Err(OrchestratorError::config_error(format!(
        "unsupported store url: {}",
        config.url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_scheme_selects_embedded_store() {
        let config = StoreConfig {
            url: "memory://".to_string(),
            ..StoreConfig::default()
        };
        assert!(create_store(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_rejected() {
        let config = StoreConfig {
            url: "postgres://localhost/db".to_string(),
            ..StoreConfig::default()
        };
        let err = match create_store(&config).await {
            Err(err) => err,
            Ok(_) => panic!("expected create_store to reject unsupported scheme"),
        };
        assert_eq!(err.kind(), "CONFIGURATION");
    }
}
