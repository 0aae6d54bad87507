//! # Application State
//!
//! Everything a handler needs, owned explicitly and cloned cheaply: the
//! record and creator stores, the content store uploads are pinned to, the
//! gateway fetcher, request metrics and configuration.
//!
//! The store backend is picked once at startup: PostgreSQL when a pool is
//! available, otherwise process memory.

use std::sync::Arc;

use sqlx::PgPool;

use snapie_ipfs::{ContentStore, GatewayFetcher};
use snapie_store::{CreatorStore, MemoryStore, PgStore, RecordStore};

use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub creators: Arc<dyn CreatorStore>,
    pub content: Arc<dyn ContentStore>,
    pub fetcher: Arc<dyn GatewayFetcher>,
    /// Present when backed by PostgreSQL; used by the readiness probe.
    pub db_pool: Option<PgPool>,
    pub metrics: ApiMetrics,
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &if self.db_pool.is_some() { "postgres" } else { "memory" })
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State over PostgreSQL when `db_pool` is given, else an in-memory store.
    pub fn new(
        config: AppConfig,
        content: Arc<dyn ContentStore>,
        fetcher: Arc<dyn GatewayFetcher>,
        db_pool: Option<PgPool>,
    ) -> Self {
        match db_pool {
            Some(pool) => {
                let store = PgStore::new(pool.clone());
                let mut state = Self::with_stores(
                    config,
                    Arc::new(store.clone()),
                    Arc::new(store),
                    content,
                    fetcher,
                );
                state.db_pool = Some(pool);
                state
            }
            None => {
                let store = MemoryStore::new();
                Self::with_stores(config, Arc::new(store.clone()), Arc::new(store), content, fetcher)
            }
        }
    }

    /// State over caller-supplied stores.
    pub fn with_stores(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        creators: Arc<dyn CreatorStore>,
        content: Arc<dyn ContentStore>,
        fetcher: Arc<dyn GatewayFetcher>,
    ) -> Self {
        Self {
            records,
            creators,
            content,
            fetcher,
            db_pool: None,
            metrics: ApiMetrics::new(),
            config: Arc::new(config),
        }
    }
}
