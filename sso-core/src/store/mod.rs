//! Durable storage behind the broker.
//!
//! The broker only depends on [`SsoStore`]; [`sqlite::SqliteStore`] is the
//! implementation shipped with the workspace.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{
    AppModule, AuthorizationCode, Client, CodeConsumption, SigningConfig, UserCredentials,
    UserProfile,
};

pub use sqlite::SqliteStore;

#[async_trait]
pub trait SsoStore: Send + Sync {
    /// Most recently updated enabled signing configuration, if any
    async fn load_active_config(&self) -> Result<Option<SigningConfig>, StoreError>;

    /// Every registered client with its enabled redirect URLs
    async fn load_clients(&self) -> Result<Vec<Client>, StoreError>;

    /// Persists a freshly issued code.
    ///
    /// Fails with [`StoreError::DuplicateCode`] when the code already exists.
    async fn insert_code(&self, code: &AuthorizationCode) -> Result<(), StoreError>;

    /// Atomically marks the code issued to `client_id` as used.
    ///
    /// Only one caller can ever observe [`CodeConsumption::Consumed`] for a
    /// given code. Expired codes are reported and left untouched.
    async fn consume_code(
        &self,
        code: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CodeConsumption, StoreError>;

    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>, StoreError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn find_user_by_email(&self, email: &str)
        -> Result<Option<UserCredentials>, StoreError>;

    /// Codes of the active roles assigned to the user, sorted
    async fn list_user_roles(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Enabled modules of an application, ordered by label
    async fn list_app_modules(&self, client_id: &str) -> Result<Vec<AppModule>, StoreError>;

    /// Raw permission rows for (client, user). A missing `allowed` counts as granted.
    async fn list_module_permissions(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<Vec<(String, bool)>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
