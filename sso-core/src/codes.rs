//! Issuance and one-time exchange of authorization codes.

use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use url::Url;

use crate::error::{BrokerError, StoreError};
use crate::models::{AuthorizationCode, Claims, CodeConsumption, IssuedCode, IssuedToken};
use crate::registry::RegistrySnapshot;
use crate::secret::{random_token, verify_secret};
use crate::store::SsoStore;
use crate::tokens::sign_token;

/// 256-bit codes
pub const CODE_BYTES: usize = 32;
pub const STATE_BYTES: usize = 24;

/// Browser context recorded with an issued code
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
}

fn new_code(
    client_id: &str,
    user_id: &str,
    ctx: &RequestContext,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> AuthorizationCode {
    AuthorizationCode {
        code: random_token(CODE_BYTES),
        state: random_token(STATE_BYTES),
        client_id: client_id.to_string(),
        user_id: user_id.to_string(),
        request_ip: ctx.request_ip.clone(),
        user_agent: ctx.user_agent.clone(),
        created_at: now,
        expires_at: now + Duration::seconds(ttl_secs),
        used_at: None,
    }
}

/// Mints a code binding `user_id` to `client_id`.
///
/// A collision on the code is retried once with fresh values.
pub async fn issue_code(
    store: &dyn SsoStore,
    snapshot: &RegistrySnapshot,
    client_id: &str,
    user_id: &str,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> Result<IssuedCode, BrokerError> {
    let client = snapshot.clients.enabled_client(client_id)?;
    let ttl = snapshot.config.code_ttl_secs;

    let mut row = new_code(&client.client_id, user_id, ctx, ttl, now);
    match store.insert_code(&row).await {
        Ok(()) => {}
        Err(StoreError::DuplicateCode) => {
            warn!("Authorization code collision for client {client_id}, retrying once");
            row = new_code(&client.client_id, user_id, ctx, ttl, now);
            store.insert_code(&row).await?;
        }
        Err(e) => return Err(e.into()),
    }

    info!("Issued SSO code for client={client_id} user={user_id}");
    Ok(IssuedCode {
        code: row.code,
        state: row.state,
        expires_at: row.expires_at,
    })
}

/// Appends `code` and `state` to a registered redirect URL, keeping its query.
pub fn build_redirect(base: &str, code: &str, state: &str) -> Result<String, BrokerError> {
    let mut url = Url::parse(base).map_err(|e| {
        error!("Registered redirect URL {base} is not a valid URL: {e}");
        BrokerError::RedirectUnavailable
    })?;
    url.query_pairs_mut()
        .append_pair("code", code)
        .append_pair("state", state);
    Ok(url.to_string())
}

/// Authenticates the client, consumes the code once and signs a token for it.
pub async fn exchange_code(
    store: &dyn SsoStore,
    snapshot: &RegistrySnapshot,
    code: &str,
    client_id: &str,
    client_secret: &str,
    now: DateTime<Utc>,
) -> Result<IssuedToken, BrokerError> {
    let client = snapshot.clients.enabled_client(client_id)?;

    // argon2 verification is CPU bound
    let hash = client.secret_hash.clone();
    let secret = client_secret.to_string();
    let secret_ok = tokio::task::spawn_blocking(move || verify_secret(&hash, &secret))
        .await
        .unwrap_or_else(|e| {
            error!("Secret verification task failed: {e}");
            false
        });
    if !secret_ok {
        warn!("Rejected code exchange for client {client_id}: bad client secret");
        return Err(BrokerError::ClientUnauthorized);
    }

    let user_id = match store.consume_code(code, client_id, now).await? {
        CodeConsumption::Consumed { user_id } => user_id,
        CodeConsumption::NotFound => return Err(BrokerError::CodeInvalid),
        CodeConsumption::AlreadyUsed => {
            warn!("Replay of a consumed SSO code for client {client_id}");
            return Err(BrokerError::CodeAlreadyUsed);
        }
        CodeConsumption::Expired => return Err(BrokerError::CodeExpired),
    };

    let claims = Claims::issue(&snapshot.config, &user_id, &client.audience, now);
    let access_token = sign_token(&snapshot.config, &claims)?;

    info!("Exchanged SSO code for client={client_id} user={user_id}");
    Ok(IssuedToken {
        access_token,
        expires_in: snapshot.config.jwt_ttl_secs,
    })
}
