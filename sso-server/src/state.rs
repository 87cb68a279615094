use crate::config::Settings;
use crate::session::SessionStore;
use sso_core::{SqliteStore, SsoBroker, StoreError};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub broker: Arc<SsoBroker>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn with_store(settings: Settings, store: SqliteStore) -> Self {
        let broker = SsoBroker::new(Arc::new(store), settings.registry_freshness());
        Self {
            sessions: SessionStore::new(&settings.session),
            broker: Arc::new(broker),
            settings: Arc::new(settings),
        }
    }

    /// Opens the configured database and applies the schema
    pub async fn new(settings: Settings) -> Result<Self, StoreError> {
        let store =
            SqliteStore::connect(&settings.database.url, settings.database.max_connections).await?;
        Ok(Self::with_store(settings, store))
    }

    /// Store reachable and registry loadable
    pub async fn health_check(&self) -> bool {
        match self.broker.ready().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Readiness check failed: {e}");
                false
            }
        }
    }
}
