use config::{Config, ConfigError};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection string
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Browser session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of live sessions
    #[serde(default = "default_session_capacity")]
    pub capacity: u64,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Adds the Secure attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            capacity: default_session_capacity(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The port the identity provider listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum age of the cached signing configuration and client registry
    #[serde(default = "default_registry_freshness")]
    pub registry_freshness_secs: u64,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_port() -> u16 {
    8090
}

fn default_registry_freshness() -> u64 {
    30
}

fn default_database_url() -> String {
    "sqlite://sso.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_session_ttl() -> u64 {
    8 * 3600
}

fn default_session_capacity() -> u64 {
    10_000
}

fn default_cookie_name() -> String {
    "sso_session".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            registry_freshness_secs: default_registry_freshness(),
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `SSO_*` environment variables (`__` separates nested keys)
    pub fn new() -> Result<Self, String> {
        Config::builder()
            .add_source(
                config::Environment::with_prefix("SSO")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    pub fn registry_freshness(&self) -> Duration {
        Duration::from_secs(self.registry_freshness_secs)
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            port: 0, // Let the OS choose a port
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            ..Default::default()
        }
    }
}
