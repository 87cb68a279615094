use crate::config::SessionConfig;
use crate::error::SessionError;
use moka::future::Cache as MokaCache;
use serde::Serialize;
use sso_core::secret::random_token;
use sso_core::{AppModule, PermissionSet, UserInfo};
use std::time::Duration;

const SESSION_ID_BYTES: usize = 32;

/// Local session of the relying party, built from what the identity provider returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelaySession {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
    pub modules: Vec<AppModule>,
    pub permissions: PermissionSet,
    /// Created from a locally validated token because userinfo was unavailable
    pub degraded: bool,
}

impl RelaySession {
    /// Subject-only session: no roles and no permissions
    pub fn subject_only(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: String::new(),
            display_name: String::new(),
            roles: Vec::new(),
            modules: Vec::new(),
            permissions: PermissionSet::new(),
            degraded: true,
        }
    }

    /// Grants access when the module is allowed or the user holds `master`
    pub fn require_module(&self, module_key: &str) -> Result<(), SessionError> {
        if self.permissions.allows(module_key) {
            Ok(())
        } else {
            Err(SessionError::Forbidden(module_key.to_string()))
        }
    }
}

impl From<UserInfo> for RelaySession {
    fn from(user: UserInfo) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            display_name: user.name,
            roles: user.roles,
            modules: user.modules,
            permissions: user.permissions,
            degraded: false,
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: MokaCache<String, RelaySession>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let sessions = MokaCache::builder()
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .max_capacity(config.capacity)
            .build();
        Self { sessions }
    }

    /// Stores the session and returns its new id
    pub async fn create(&self, session: RelaySession) -> String {
        let id = random_token(SESSION_ID_BYTES);
        self.sessions.insert(id.clone(), session).await;
        id
    }

    pub async fn get(&self, id: &str) -> Option<RelaySession> {
        self.sessions.get(id).await
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.invalidate(id).await;
    }
}
