use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::codes::{self, RequestContext};
use crate::error::BrokerError;
use crate::models::{
    Claims, IssuedCode, IssuedToken, PermissionSet, UserCredentials, UserInfo, UserProfile,
};
use crate::permissions::{self, scope_for_audience};
use crate::registry::{RegistryCache, RegistrySnapshot};
use crate::secret::{decoy_hash, verify_secret};
use crate::store::SsoStore;
use crate::tokens::validate_token;

/// Where to send the browser after a successful start
#[derive(Debug, Clone)]
pub struct StartRedirect {
    pub location: String,
    pub code: IssuedCode,
}

/// Userinfo answer: the application the token was issued for and the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfoGrant {
    pub client_id: String,
    pub user: UserInfo,
}

/// Entry point of the identity provider side of the SSO flow
pub struct SsoBroker {
    store: Arc<dyn SsoStore>,
    registry: RegistryCache,
}

impl SsoBroker {
    pub fn new(store: Arc<dyn SsoStore>, freshness: Duration) -> Self {
        Self {
            registry: RegistryCache::new(store.clone(), freshness),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SsoStore> {
        &self.store
    }

    pub async fn snapshot(&self) -> Result<Arc<RegistrySnapshot>, BrokerError> {
        self.registry.load().await
    }

    /// Store reachable and registry loadable
    pub async fn ready(&self) -> Result<(), BrokerError> {
        self.store.health_check().await?;
        self.registry.load().await?;
        Ok(())
    }

    /// Checks the login form credentials. Unknown, inactive or mismatching
    /// users all come back as `None`, after the same argon2 verification.
    pub async fn authenticate_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, BrokerError> {
        let creds = self.store.find_user_by_email(email).await?;
        let (hash, profile) = login_candidate(creds);
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_secret(&hash, &password))
            .await
            .unwrap_or(false);
        Ok(profile.filter(|_| matches))
    }

    pub async fn issue_code(
        &self,
        client_id: &str,
        user_id: &str,
        ctx: &RequestContext,
    ) -> Result<IssuedCode, BrokerError> {
        let snapshot = self.registry.load().await?;
        codes::issue_code(self.store.as_ref(), &snapshot, client_id, user_id, ctx, Utc::now()).await
    }

    /// Issues a code and builds the redirect back to the client.
    ///
    /// No code is stored unless the redirect resolves.
    pub async fn start_redirect(
        &self,
        client_id: &str,
        user_id: &str,
        preferred: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<StartRedirect, BrokerError> {
        let snapshot = self.registry.load().await?;
        let base = snapshot.clients.redirect_for(client_id, preferred)?.to_string();
        let code =
            codes::issue_code(self.store.as_ref(), &snapshot, client_id, user_id, ctx, Utc::now())
                .await?;
        let location = codes::build_redirect(&base, &code.code, &code.state)?;
        Ok(StartRedirect { location, code })
    }

    pub async fn exchange(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<IssuedToken, BrokerError> {
        let snapshot = self.registry.load().await?;
        codes::exchange_code(
            self.store.as_ref(),
            &snapshot,
            code,
            client_id,
            client_secret,
            Utc::now(),
        )
        .await
    }

    /// Validates a token against an explicit audience list.
    pub async fn validate(
        &self,
        token: &str,
        expected_audiences: &[String],
    ) -> Result<Claims, BrokerError> {
        let snapshot = self.registry.load().await?;
        validate_token(&snapshot.config, token, expected_audiences)
    }

    pub async fn resolve_permissions(
        &self,
        audience: &str,
        user_id: &str,
    ) -> Result<PermissionSet, BrokerError> {
        let snapshot = self.registry.load().await?;
        permissions::resolve_permissions(self.store.as_ref(), &snapshot.clients, audience, user_id)
            .await
    }

    /// Identity, roles, modules and permissions of the token's subject.
    ///
    /// The token must be addressed to a currently enabled client.
    pub async fn userinfo(&self, token: &str) -> Result<UserInfoGrant, BrokerError> {
        let snapshot = self.registry.load().await?;
        let audiences = snapshot.clients.enabled_audiences();
        let claims = validate_token(&snapshot.config, token, &audiences)?;

        let user = match self.store.find_user(&claims.sub).await? {
            Some(user) if user.is_active => user,
            _ => return Err(BrokerError::UserInactive),
        };

        let scope = scope_for_audience(&snapshot.clients, &claims.aud).to_string();
        let roles = self.store.list_user_roles(&user.user_id).await?;
        let modules = self.store.list_app_modules(&scope).await?;
        let permissions = permissions::resolve_permissions(
            self.store.as_ref(),
            &snapshot.clients,
            &claims.aud,
            &user.user_id,
        )
        .await?;

        Ok(UserInfoGrant {
            client_id: scope,
            user: UserInfo {
                user_id: user.user_id,
                email: user.email,
                name: user.name,
                roles,
                modules,
                permissions,
            },
        })
    }
}

/// Hash to verify the submitted password against, and the profile it unlocks.
/// Users that cannot log in are checked against the decoy hash.
fn login_candidate(creds: Option<UserCredentials>) -> (String, Option<UserProfile>) {
    match creds {
        Some(creds) if creds.profile.is_active => (creds.password_hash, Some(creds.profile)),
        Some(creds) => {
            warn!("Login attempt for inactive user {}", creds.profile.user_id);
            (decoy_hash().to_string(), None)
        }
        None => {
            debug!("Login attempt for unknown email");
            (decoy_hash().to_string(), None)
        }
    }
}
