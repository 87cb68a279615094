use crate::config::Settings;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use chrono::Utc;
use http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sso_core::secret::hash_secret;
use sso_core::{AppModule, SigningConfig, SqliteStore, UserProfile, MASTER_MODULE};
use tower::ServiceExt;

pub const ISSUER: &str = "https://idp.test";
pub const APP1_SECRET: &str = "app1-secret";
pub const APP2_SECRET: &str = "app2-secret";
pub const APP1_CALLBACK: &str = "https://app1.test/sso/callback";
pub const PASSWORD: &str = "correct horse";

/// Test fixture for exercising the identity provider end to end.
///
/// The fixture owns an in-memory store seeded with:
/// - an HS256 signing configuration (token TTL 900s, code TTL 60s)
/// - clients `app1` (audience `app1-api`) and `app2` (audience `app2-api`)
/// - `u-1` (ana@example.com) with `comercial` granted and `industrial` denied on app1
/// - `u-2` (bia@example.com) holding the `master` module on app1
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     let cookie = fixture.login("ana@example.com").await;
///     let response = fixture.get_with_cookie("/sso/start/app1", &cookie).await;
///     response.assert_status(StatusCode::SEE_OTHER);
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub settings: Settings,
    /// Backing store, for seeding and inspection
    pub store: SqliteStore,
}

impl TestFixture {
    /// Creates a fixture with the seeded store
    pub async fn new() -> Self {
        let fixture = Self::without_seed().await;
        seed(&fixture.store).await;
        fixture
    }

    /// Creates a fixture over an empty schema (no signing configuration)
    pub async fn without_seed() -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let settings = Settings::for_test();
        let store = SqliteStore::in_memory()
            .await
            .expect("Failed to open in-memory store");
        let state = AppState::with_store(settings.clone(), store.clone());
        let app = create_app(state).await;

        Self {
            app,
            settings,
            store,
        }
    }

    /// Initializes the test logger with a custom level.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Sends a GET request to the specified URI.
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        self.get_with_headers(uri, &[]).await
    }

    /// Sends a GET request carrying the session cookie.
    pub async fn get_with_cookie(&self, uri: impl AsRef<str>, cookie: &str) -> TestResponse {
        self.get_with_headers(uri, &[(COOKIE.as_str(), cookie)]).await
    }

    /// Sends a GET request with custom headers.
    pub async fn get_with_headers(
        &self,
        uri: impl AsRef<str>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri.as_ref());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a POST request with a JSON body to the specified URI.
    pub async fn post<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a POST request with a url-encoded form body.
    pub async fn post_form(&self, uri: impl AsRef<str>, fields: &[(&str, &str)]) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Logs `email` in with the fixture password and returns the `Cookie` header value
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .post_form("/login", &[("email", email), ("password", PASSWORD)])
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        response
            .cookie()
            .expect("Login did not set a session cookie")
    }

    /// Logs in, starts SSO for `client_id` and returns the issued code
    pub async fn issue_code(&self, email: &str, client_id: &str) -> String {
        let cookie = self.login(email).await;
        let response = self
            .get_with_cookie(format!("/sso/start/{client_id}"), &cookie)
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        let location = response.location().expect("Missing Location header");
        let url = url::Url::parse(&location).expect("Location is not a URL");
        url.query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .expect("Location has no code")
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body).to_string();
        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse {
            status,
            headers,
            text,
            json,
        }
    }
}

/// Signing configuration stored by [`TestFixture::new`]
pub fn signing_config() -> SigningConfig {
    SigningConfig {
        issuer: ISSUER.to_string(),
        jwt_alg: "HS256".to_string(),
        jwt_secret: "fixture-signing-secret".to_string(),
        jwt_ttl_secs: 900,
        code_ttl_secs: 60,
        state_ttl_secs: 600,
    }
}

async fn seed(store: &SqliteStore) {
    store
        .insert_signing_config(&signing_config(), Utc::now())
        .await
        .expect("Failed to seed signing config");

    for (client_id, secret, callback) in [
        ("app1", APP1_SECRET, APP1_CALLBACK),
        ("app2", APP2_SECRET, "https://app2.test/sso/callback"),
    ] {
        let hash = hash_secret(secret).expect("Failed to hash secret");
        store
            .upsert_client(client_id, &hash, &format!("{client_id}-api"), true)
            .await
            .expect("Failed to seed client");
        store
            .add_redirect(client_id, callback)
            .await
            .expect("Failed to seed redirect");
    }

    for (key, label) in [("comercial", "Comercial"), ("industrial", "Industrial")] {
        let module = AppModule {
            module_key: key.to_string(),
            module_label: label.to_string(),
            enabled: true,
        };
        store
            .add_app_module("app1", &module)
            .await
            .expect("Failed to seed module");
    }

    let password_hash = hash_secret(PASSWORD).expect("Failed to hash password");
    for (user_id, email, name) in [
        ("u-1", "ana@example.com", "Ana"),
        ("u-2", "bia@example.com", "Bia"),
    ] {
        let profile = UserProfile {
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            is_active: true,
        };
        store
            .upsert_user(&profile, &password_hash)
            .await
            .expect("Failed to seed user");
    }
    store.add_role("SALES", true).await.expect("Failed to seed role");
    store
        .assign_role("u-1", "SALES")
        .await
        .expect("Failed to assign role");

    for (user_id, module_key, allowed) in [
        ("u-1", "comercial", Some(true)),
        ("u-1", "industrial", Some(false)),
        ("u-2", MASTER_MODULE, Some(true)),
    ] {
        store
            .set_permission("app1", user_id, module_key, allowed)
            .await
            .expect("Failed to seed permission");
    }
}

/// Response from a test request that provides convenient access to status, headers and body.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    pub json: Value,
}

impl TestResponse {
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {} with body: {}",
            expected, self.status, self.text
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }

    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// `name=value` part of the first Set-Cookie header, ready to send back
    pub fn cookie(&self) -> Option<String> {
        self.headers
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}
