use std::sync::Arc;

use draftsync_state::DraftStore;
use draftsync_state_memory::MemoryDraftStore;
#[cfg(feature = "postgres")]
use draftsync_state_postgres::{PostgresConfig, PostgresDraftStore};
use tracing::info;

use crate::config::StateConfig;
use crate::error::ServerError;

/// Construct the draft record store from configuration. The `postgres`
/// backend runs its migrations on connect.
pub async fn create_store(config: &StateConfig) -> Result<Arc<dyn DraftStore>, ServerError> {
    let store = match config.backend.as_str() {
        "memory" => Ok(create_memory()),
        #[cfg(feature = "postgres")]
        "postgres" => create_postgres(config).await,
        other => Err(ServerError::Config(format!(
            "unsupported state backend: {other} (is the feature enabled?)"
        ))),
    }?;
    info!(backend = %config.backend, "draft store initialized");
    Ok(store)
}

fn create_memory() -> Arc<dyn DraftStore> {
    Arc::new(MemoryDraftStore::new())
}

#[cfg(feature = "postgres")]
async fn create_postgres(config: &StateConfig) -> Result<Arc<dyn DraftStore>, ServerError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| ServerError::Config("postgres backend requires 'url' in [state]".into()))?;
    let defaults = PostgresConfig::default();
    let pg_config = PostgresConfig {
        url: url.to_owned(),
        pool_size: config.pool_size.unwrap_or(defaults.pool_size),
        schema: config.schema.clone().unwrap_or(defaults.schema),
        table_prefix: config.table_prefix.clone().unwrap_or(defaults.table_prefix),
        ..PostgresConfig::default()
    };
    let store = PostgresDraftStore::new(pg_config).await?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend() {
        let store = create_store(&StateConfig::default()).await.unwrap();
        assert_eq!(store.count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = StateConfig {
            backend: "redis".into(),
            ..StateConfig::default()
        };
        let err = create_store(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(msg) if msg.contains("redis")));
    }
}
