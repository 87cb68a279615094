//! Request and response bodies of the relying-party API

use serde::{Deserialize, Serialize};
use sso_core::{AppModule, IssuedToken, UserInfo, UserInfoGrant};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Code exchange request sent by a relying party
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ExchangeRequest {
    /// Authorization code received on the callback
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Trimmed, non-empty exchange parameters
pub(crate) struct ExchangeParams {
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ExchangeRequest {
    /// `None` when any parameter is missing or blank
    pub(crate) fn into_params(self) -> Option<ExchangeParams> {
        Some(ExchangeParams {
            code: required(self.code)?,
            client_id: required(self.client_id)?,
            client_secret: required(self.client_secret)?,
        })
    }
}

/// Successful code exchange
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ExchangeResponse {
    pub ok: bool,
    /// Always "Bearer"
    pub token_type: String,
    pub access_token: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
}

impl From<IssuedToken> for ExchangeResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            ok: true,
            token_type: "Bearer".to_string(),
            access_token: token.access_token,
            expires_in: token.expires_in,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
pub struct ModulePayload {
    pub module_key: String,
    pub module_label: String,
    pub enabled: bool,
}

impl From<AppModule> for ModulePayload {
    fn from(module: AppModule) -> Self {
        Self {
            module_key: module.module_key,
            module_label: module.module_label,
            enabled: module.enabled,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
pub struct UserPayload {
    pub user_id: String,
    pub email: String,
    pub name: String,
    /// Active role codes
    pub roles: Vec<String>,
    /// Enabled modules of the application, ordered by label
    pub modules: Vec<ModulePayload>,
    /// Module key to access flag; `master` grants every module
    pub permissions: BTreeMap<String, bool>,
}

impl From<UserInfo> for UserPayload {
    fn from(info: UserInfo) -> Self {
        Self {
            user_id: info.user_id,
            email: info.email,
            name: info.name,
            roles: info.roles,
            modules: info.modules.into_iter().map(ModulePayload::from).collect(),
            permissions: info
                .permissions
                .iter()
                .map(|(key, allowed)| (key.clone(), *allowed))
                .collect(),
        }
    }
}

/// Identity and permissions of the token subject
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UserInfoResponse {
    pub ok: bool,
    /// Application the token was issued for
    pub client_id: String,
    pub user: UserPayload,
}

impl From<UserInfoGrant> for UserInfoResponse {
    fn from(grant: UserInfoGrant) -> Self {
        Self {
            ok: true,
            client_id: grant.client_id,
            user: grant.user.into(),
        }
    }
}

/// Optional parameters of the SSO start endpoint
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartQuery {
    /// Preferred registered redirect URL
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Error body shared by the API endpoints
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub ok: bool,
    pub message: String,
}
