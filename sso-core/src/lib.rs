//! # sso-core
//!
//! Identity provider side of the federated SSO flow.
//!
//! ## Components
//!
//! - **Registry:** cached signing configuration and registered clients.
//! - **Store:** durable single-use authorization codes, users and permissions.
//! - **Codes:** code issuance and the one-time code exchange.
//! - **Tokens:** signing and verification of audience-bound tokens.
//! - **Permissions:** per-application module permissions with the `master` wildcard.
//! - **Broker:** high-level API tying the pieces together.

pub mod broker;
pub mod codes;
pub mod cookies;
pub mod error;
pub mod models;
pub mod permissions;
pub mod registry;
pub mod secret;
pub mod store;
pub mod tokens;

pub use crate::broker::{SsoBroker, StartRedirect, UserInfoGrant};
pub use crate::codes::RequestContext;
pub use crate::error::{BrokerError, StoreError};
pub use crate::models::{
    AppModule, Claims, IssuedCode, IssuedToken, PermissionSet, SigningConfig, UserInfo,
    UserProfile, MASTER_MODULE,
};
pub use crate::registry::DEFAULT_FRESHNESS;
pub use crate::store::{SqliteStore, SsoStore};
pub use crate::tokens::{sign_token, validate_token};
