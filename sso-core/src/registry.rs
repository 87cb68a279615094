//! Cached view of the signing configuration and the registered clients.
//!
//! Readers share one immutable [`RegistrySnapshot`]. When the snapshot is
//! older than the freshness window the next reader reloads it from the store
//! and publishes a new one; concurrent stale readers wait for that single
//! reload instead of hitting the store themselves.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use tokio::sync::{Mutex, RwLock};

use crate::error::BrokerError;
use crate::models::{Client, SigningConfig};
use crate::store::SsoStore;

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(30);

/// Registered clients keyed by id
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }

    /// Client in any state
    pub fn client(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn enabled_client(&self, client_id: &str) -> Result<&Client, BrokerError> {
        match self.clients.get(client_id) {
            Some(client) if client.enabled => Ok(client),
            _ => Err(BrokerError::ClientInvalid),
        }
    }

    /// Client owning `audience`, enabled ones first
    pub fn client_for_audience(&self, audience: &str) -> Option<&Client> {
        self.clients
            .values()
            .filter(|c| c.audience == audience)
            .min_by_key(|c| (!c.enabled, c.client_id.as_str()))
    }

    /// Audiences that currently accept tokens
    pub fn enabled_audiences(&self) -> Vec<String> {
        let mut audiences: Vec<String> = self
            .clients
            .values()
            .filter(|c| c.enabled)
            .map(|c| c.audience.clone())
            .collect();
        audiences.sort();
        audiences.dedup();
        audiences
    }

    /// Redirect URL to send the browser to after issuing a code.
    ///
    /// `preferred` must match one of the enabled registered URLs exactly.
    /// Without a preference the first registered URL is used.
    pub fn redirect_for(&self, client_id: &str, preferred: Option<&str>) -> Result<&str, BrokerError> {
        let client = self.enabled_client(client_id)?;
        let Some(first) = client.redirects.first() else {
            return Err(BrokerError::RedirectUnavailable);
        };
        match preferred.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(first.as_str()),
            Some(wanted) => client
                .redirects
                .iter()
                .find(|r| r.as_str() == wanted)
                .map(String::as_str)
                .ok_or(BrokerError::RedirectNotAllowed),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Configuration and clients loaded together from the store
#[derive(Debug)]
pub struct RegistrySnapshot {
    pub config: SigningConfig,
    pub clients: ClientRegistry,
    loaded_at: Instant,
}

impl RegistrySnapshot {
    pub fn new(config: SigningConfig, clients: ClientRegistry) -> Self {
        Self {
            config,
            clients,
            loaded_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }
}

pub struct RegistryCache {
    store: Arc<dyn SsoStore>,
    freshness: Duration,
    current: RwLock<Option<Arc<RegistrySnapshot>>>,
    reload_lock: Mutex<()>,
}

impl RegistryCache {
    pub fn new(store: Arc<dyn SsoStore>, freshness: Duration) -> Self {
        Self {
            store,
            freshness,
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Current snapshot, reloaded first when stale.
    pub async fn load(&self) -> Result<Arc<RegistrySnapshot>, BrokerError> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let _guard = self.reload_lock.lock().await;
        // Another task may have reloaded while we were waiting
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.reload().await?);
        *self.current.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn fresh_snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|s| s.age() < self.freshness)
            .cloned()
    }

    async fn reload(&self) -> Result<RegistrySnapshot, BrokerError> {
        debug!("Reloading SSO registry from store");
        let config = match self.store.load_active_config().await? {
            Some(config) => config,
            None => {
                error!("No enabled SSO configuration found in tb_sso_config");
                return Err(BrokerError::ConfigurationMissing);
            }
        };
        if config.jwt_secret.is_empty() {
            error!("Active SSO configuration has an empty signing secret");
            return Err(BrokerError::ConfigurationMissing);
        }
        if let Err(err) = config.algorithm() {
            error!("Active SSO configuration is unusable: {err}");
            return Err(err);
        }

        let clients = ClientRegistry::new(self.store.load_clients().await?);
        info!(
            "SSO registry loaded: issuer={}, alg={}, clients={}",
            config.issuer,
            config.jwt_alg,
            clients.len()
        );
        Ok(RegistrySnapshot::new(config, clients))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: &str, audience: &str, enabled: bool, redirects: &[&str]) -> Client {
        Client {
            client_id: id.to_string(),
            secret_hash: String::new(),
            audience: audience.to_string(),
            enabled,
            redirects: redirects.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn registry() -> ClientRegistry {
        ClientRegistry::new(vec![
            client("app1", "aud-1", true, &["https://app1/cb", "https://app1/alt?x=1"]),
            client("app2", "aud-2", false, &["https://app2/cb"]),
            client("app3", "aud-3", true, &[]),
            client("app4", "aud-1", true, &["https://app4/cb"]),
        ])
    }

    #[test]
    fn test_enabled_client() {
        let registry = registry();
        assert!(registry.enabled_client("app1").is_ok());
        assert!(matches!(
            registry.enabled_client("app2"),
            Err(BrokerError::ClientInvalid)
        ));
        assert!(matches!(
            registry.enabled_client("nope"),
            Err(BrokerError::ClientInvalid)
        ));
        assert!(registry.client("app2").is_some());
    }

    #[test]
    fn test_redirect_selection() {
        let registry = registry();
        assert_eq!(registry.redirect_for("app1", None).unwrap(), "https://app1/cb");
        assert_eq!(
            registry
                .redirect_for("app1", Some("https://app1/alt?x=1"))
                .unwrap(),
            "https://app1/alt?x=1"
        );
        assert_eq!(registry.redirect_for("app1", Some("  ")).unwrap(), "https://app1/cb");
        assert!(matches!(
            registry.redirect_for("app1", Some("https://evil/cb")),
            Err(BrokerError::RedirectNotAllowed)
        ));
        assert!(matches!(
            registry.redirect_for("app3", None),
            Err(BrokerError::RedirectUnavailable)
        ));
        assert!(matches!(
            registry.redirect_for("app2", None),
            Err(BrokerError::ClientInvalid)
        ));
    }

    #[test]
    fn test_audiences() {
        let registry = registry();
        assert_eq!(registry.enabled_audiences(), vec!["aud-1", "aud-3"]);
        assert!(registry.client_for_audience("aud-2").is_some());
        assert!(registry.client_for_audience("aud-9").is_none());
        assert_eq!(registry.client_for_audience("aud-1").unwrap().client_id, "app1");
    }
}
