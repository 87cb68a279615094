use crate::client::IdpClient;
use crate::config::RelaySettings;
use crate::error::RelayError;
use crate::session::{RelaySession, SessionStore};
use log::warn;
use sso_core::{validate_token, SigningConfig};
use std::sync::Arc;

/// Shared secret and audience for validating tokens without the identity provider
#[derive(Clone)]
struct LocalValidator {
    config: SigningConfig,
    audiences: Vec<String>,
}

#[derive(Clone)]
pub struct RelayState {
    pub settings: Arc<RelaySettings>,
    pub idp: IdpClient,
    pub sessions: SessionStore,
    local: Option<LocalValidator>,
}

impl RelayState {
    pub fn new(settings: RelaySettings) -> Result<Self, RelayError> {
        let idp = IdpClient::new(&settings)?;
        let local = settings
            .local_validation
            .as_ref()
            .map(|local| LocalValidator {
                config: local.signing_config(),
                audiences: vec![local.audience.clone()],
            });
        Ok(Self {
            sessions: SessionStore::new(&settings.session),
            idp,
            local,
            settings: Arc::new(settings),
        })
    }

    /// Falls back to a subject-only session when the identity provider is
    /// unavailable and the token verifies locally. Otherwise `cause` is
    /// returned unchanged.
    pub(crate) fn local_session(
        &self,
        access_token: &str,
        cause: RelayError,
    ) -> Result<RelaySession, RelayError> {
        if !cause.is_idp_unavailable() {
            return Err(cause);
        }
        let Some(local) = &self.local else {
            return Err(cause);
        };
        match validate_token(&local.config, access_token, &local.audiences) {
            Ok(claims) => {
                warn!(
                    "Userinfo unavailable ({cause}), opening subject-only session for {}",
                    claims.sub
                );
                Ok(RelaySession::subject_only(claims.sub))
            }
            Err(err) => {
                warn!("Local token validation failed: {err}");
                Err(cause)
            }
        }
    }
}
