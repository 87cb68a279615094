use config::{Config, ConfigError};
use serde::Deserialize;
use sso_core::SigningConfig;
use std::time::Duration;

/// Browser session settings of the relying party
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_session_capacity")]
    pub capacity: u64,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Adds the `Secure` attribute to the session cookie
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

/// Shared signing secret used to validate tokens when userinfo is unavailable
#[derive(Debug, Deserialize, Clone)]
pub struct LocalValidationConfig {
    pub issuer: String,
    pub jwt_secret: String,
    #[serde(default = "default_jwt_alg")]
    pub jwt_alg: String,
    /// Audience this relying party was registered with
    pub audience: String,
}

impl LocalValidationConfig {
    pub fn signing_config(&self) -> SigningConfig {
        SigningConfig {
            issuer: self.issuer.clone(),
            jwt_alg: self.jwt_alg.clone(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_ttl_secs: 0,
            code_ttl_secs: 0,
            state_ttl_secs: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    /// The port the relay listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the identity provider, e.g. `https://sso.example.com`
    #[serde(default = "default_idp_base_url")]
    pub idp_base_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Where the browser lands after a successful callback
    #[serde(default = "default_home_path")]
    pub home_path: String,

    /// Total timeout of one call to the identity provider
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub local_validation: Option<LocalValidationConfig>,
}

fn default_port() -> u16 {
    8091
}

fn default_idp_base_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_request_timeout() -> u64 {
    12_000
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_session_ttl() -> u64 {
    8 * 3600
}

fn default_session_capacity() -> u64 {
    10_000
}

fn default_cookie_name() -> String {
    "sso_relay_session".to_string()
}

fn default_jwt_alg() -> String {
    "HS256".to_string()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            idp_base_url: default_idp_base_url(),
            client_id: String::new(),
            client_secret: String::new(),
            home_path: default_home_path(),
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            session: SessionConfig::default(),
            local_validation: None,
        }
    }
}

impl RelaySettings {
    /// Loads settings from `SSO_RELAY_*` environment variables (`__` separates nested keys)
    pub fn new() -> Result<Self, String> {
        let settings: Self = Config::builder()
            .add_source(
                config::Environment::with_prefix("SSO_RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("SSO_RELAY_CLIENT_ID is required".to_string());
        }
        if self.client_secret.trim().is_empty() {
            return Err("SSO_RELAY_CLIENT_SECRET is required".to_string());
        }
        url::Url::parse(&self.idp_base_url)
            .map_err(|e| format!("Invalid SSO_RELAY_IDP_BASE_URL: {e}"))?;
        if let Some(local) = &self.local_validation {
            local
                .signing_config()
                .algorithm()
                .map_err(|e| e.to_string())?;
            if local.jwt_secret.is_empty() {
                return Err("Local validation requires a jwt_secret".to_string());
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
