//! Data model shared by the identity provider and the relying parties

use crate::error::BrokerError;
use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Module key that grants every module of an application
pub const MASTER_MODULE: &str = "master";

/// Active signing configuration of the identity provider
#[derive(Clone, PartialEq, Eq)]
pub struct SigningConfig {
    pub issuer: String,
    /// Algorithm name as stored, e.g. "HS256"
    pub jwt_alg: String,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub code_ttl_secs: i64,
    pub state_ttl_secs: i64,
}

impl SigningConfig {
    /// Resolves the configured algorithm. Only the HMAC family is supported.
    pub fn algorithm(&self) -> Result<Algorithm, BrokerError> {
        match self.jwt_alg.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(BrokerError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

// The secret must never end up in logs.
impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("issuer", &self.issuer)
            .field("jwt_alg", &self.jwt_alg)
            .field("jwt_ttl_secs", &self.jwt_ttl_secs)
            .field("code_ttl_secs", &self.code_ttl_secs)
            .field("state_ttl_secs", &self.state_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// A registered relying party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub client_id: String,
    /// Argon2 PHC string of the client secret
    pub secret_hash: String,
    pub audience: String,
    pub enabled: bool,
    /// Enabled redirect URLs in registration order
    pub redirects: Vec<String>,
}

/// Durable authorization code row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: String,
    pub client_id: String,
    pub user_id: String,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Outcome of an attempt to consume an authorization code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeConsumption {
    /// The code was unused and unexpired; it is now marked as used
    Consumed { user_id: String },
    NotFound,
    AlreadyUsed,
    Expired,
}

/// Claims carried by every token issued by the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Result of a code issuance
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub state: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful code exchange
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// User row as seen by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub is_active: bool,
}

/// Credentials used by the identity provider login
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub profile: UserProfile,
    pub password_hash: String,
}

/// Functional area of an application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppModule {
    pub module_key: String,
    pub module_label: String,
    pub enabled: bool,
}

/// Module permissions of one user within one application
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, bool>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module_key: impl Into<String>, allowed: bool) {
        self.0.insert(module_key.into(), allowed);
    }

    pub fn get(&self, module_key: &str) -> Option<bool> {
        self.0.get(module_key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the user holds the master wildcard
    pub fn is_master(&self) -> bool {
        self.get(MASTER_MODULE) == Some(true)
    }

    /// Whether access to `module_key` is granted. Unknown modules are denied.
    pub fn allows(&self, module_key: &str) -> bool {
        self.is_master() || self.get(module_key) == Some(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &bool)> {
        self.0.iter()
    }
}

impl FromIterator<(String, bool)> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identity and authorization returned by userinfo
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub modules: Vec<AppModule>,
    pub permissions: PermissionSet,
}
