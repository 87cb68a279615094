use moka::future::Cache as MokaCache;
use sso_core::secret::random_token;
use sso_core::UserProfile;
use std::time::Duration;

use crate::config::SessionConfig;

const SESSION_ID_BYTES: usize = 32;

/// Authenticated browser session at the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

impl From<UserProfile> for LoginSession {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            email: profile.email,
            name: profile.name,
        }
    }
}

/// In-memory session store; entries expire after the configured TTL
#[derive(Clone)]
pub struct SessionStore {
    sessions: MokaCache<String, LoginSession>,
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
    pub async fn create(&self, session: LoginSession) -> String {
        let id = random_token(SESSION_ID_BYTES);
        self.sessions.insert(id.clone(), session).await;
        id
    }

    pub async fn get(&self, id: &str) -> Option<LoginSession> {
        self.sessions.get(id).await
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.invalidate(id).await;
    }
}
