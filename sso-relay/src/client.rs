//! HTTP client for the identity provider's relying-party API

use crate::config::RelaySettings;
use crate::error::RelayError;
use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sso_core::UserInfo;
use std::time::Duration;
use url::Url;

/// Answer of `POST /api/sso/exchange`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
}

/// Answer of `GET /api/sso/userinfo`
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfoAnswer {
    pub client_id: String,
    pub user: UserInfo,
}

#[derive(Serialize)]
struct ExchangeBody<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct IdpClient {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
}

impl IdpClient {
    pub fn new(settings: &RelaySettings) -> Result<Self, RelayError> {
        let mut base_url = Url::parse(&settings.idp_base_url)
            .map_err(|e| RelayError::Transport(format!("Invalid identity provider URL: {e}")))?;
        // Relative joins replace the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            // Configure connection pool
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self {
            http,
            base_url,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Browser entry point at the identity provider for this client
    pub fn start_url(&self) -> Result<Url, RelayError> {
        self.endpoint(&format!("sso/start/{}", self.client_id))
    }

    fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        self.base_url
            .join(path)
            .map_err(|e| RelayError::Transport(format!("Invalid identity provider URL: {e}")))
    }

    /// Exchanges a callback code for an access token. Never retried.
    pub async fn exchange(&self, code: &str) -> Result<TokenGrant, RelayError> {
        let url = self.endpoint("api/sso/exchange")?;
        debug!("Exchanging code at {}", url);
        let response = self
            .http
            .post(url)
            .json(&ExchangeBody {
                code,
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn userinfo(&self, access_token: &str) -> Result<UserInfoAnswer, RelayError> {
        let url = self.endpoint("api/sso/userinfo")?;
        debug!("Fetching userinfo from {}", url);
        let response = self.http.get(url).bearer_auth(access_token).send().await?;
        read_json(response).await
    }
}

async fn read_json<R: DeserializeOwned>(response: Response) -> Result<R, RelayError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request rejected")
                    .to_string()
            });
        return Err(RelayError::Rejected { status, message });
    }

    serde_json::from_slice(&body).map_err(|e| RelayError::InvalidResponse(e.to_string()))
}
