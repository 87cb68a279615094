use crate::api::sso::models::{ExchangeResponse, UserInfoResponse};
use crate::test_utils::{signing_config, TestFixture, APP1_CALLBACK, APP1_SECRET, APP2_SECRET};
use chrono::{Duration, Utc};
use http::header::{AUTHORIZATION, CACHE_CONTROL};
use http::StatusCode;
use serde_json::json;
use sso_core::{sign_token, Claims};

async fn exchange(fixture: &TestFixture, code: &str, client_id: &str, secret: &str) -> ExchangeResponse {
    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": code, "client_id": client_id, "client_secret": secret}),
        )
        .await;
    resp.assert_ok();
    resp.json_as()
}

#[tokio::test]
async fn test_start_without_session_redirects_to_login() {
    let fixture = TestFixture::new().await;
    let resp = fixture.get("/sso/start/app1?redirect=x").await;
    resp.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        resp.location().as_deref(),
        Some("/login?next=%2Fsso%2Fstart%2Fapp1%3Fredirect%3Dx")
    );
}

#[tokio::test]
async fn test_start_redirects_to_callback_with_code_and_state() {
    let fixture = TestFixture::new().await;
    let cookie = fixture.login("ana@example.com").await;

    let resp = fixture.get_with_cookie("/sso/start/app1", &cookie).await;
    resp.assert_status(StatusCode::SEE_OTHER);

    let location = resp.location().unwrap();
    assert!(location.starts_with(APP1_CALLBACK), "{location}");
    let url = url::Url::parse(&location).unwrap();
    let code = url.query_pairs().find(|(k, _)| k == "code").unwrap().1;
    let state = url.query_pairs().find(|(k, _)| k == "state").unwrap().1;
    assert_eq!(code.len(), 43);
    assert_eq!(state.len(), 32);
}

#[tokio::test]
async fn test_start_rejects_unknown_client_and_foreign_redirect() {
    let fixture = TestFixture::new().await;
    let cookie = fixture.login("ana@example.com").await;

    let resp = fixture.get_with_cookie("/sso/start/nope", &cookie).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = fixture
        .get_with_cookie(
            "/sso/start/app1?redirect=https%3A%2F%2Fevil.test%2Fcb",
            &cookie,
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_exchange_returns_bearer_token() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app1").await;

    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": code, "client_id": "app1", "client_secret": APP1_SECRET}),
        )
        .await;
    resp.assert_ok();
    assert_eq!(
        resp.headers.get(CACHE_CONTROL).unwrap().to_str().unwrap(),
        "no-store"
    );

    let body: ExchangeResponse = resp.json_as();
    assert!(body.ok);
    assert_eq!(body.token_type, "Bearer");
    assert_eq!(body.expires_in, 900);
    assert!(!body.access_token.is_empty());
}

#[tokio::test]
async fn test_exchange_replay_is_rejected() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app1").await;
    exchange(&fixture, &code, "app1", APP1_SECRET).await;

    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": code, "client_id": "app1", "client_secret": APP1_SECRET}),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json, json!({"ok": false, "message": "Code already used"}));
}

#[tokio::test]
async fn test_exchange_missing_parameters() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post("/api/sso/exchange", &json!({"code": "abc", "client_id": "app1"}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["message"], "Missing parameters");

    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": "  ", "client_id": "app1", "client_secret": APP1_SECRET}),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["message"], "Missing parameters");
}

#[tokio::test]
async fn test_exchange_wrong_secret_keeps_code_usable() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app1").await;

    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": code, "client_id": "app1", "client_secret": "wrong"}),
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json["ok"], false);

    exchange(&fixture, &code, "app1", APP1_SECRET).await;
}

#[tokio::test]
async fn test_exchange_code_of_another_client() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app1").await;

    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": code, "client_id": "app2", "client_secret": APP2_SECRET}),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["message"], "Invalid code");
}

#[tokio::test]
async fn test_exchange_unknown_client() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": "abc", "client_id": "ghost", "client_secret": "x"}),
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_userinfo_returns_scoped_permissions() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app1").await;
    let token = exchange(&fixture, &code, "app1", APP1_SECRET).await.access_token;

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), format!("Bearer {token}").as_str())],
        )
        .await;
    resp.assert_ok();

    let body: UserInfoResponse = resp.json_as();
    assert!(body.ok);
    assert_eq!(body.client_id, "app1");
    assert_eq!(body.user.user_id, "u-1");
    assert_eq!(body.user.email, "ana@example.com");
    assert_eq!(body.user.roles, vec!["SALES".to_string()]);
    let labels: Vec<_> = body
        .user
        .modules
        .iter()
        .map(|m| m.module_label.as_str())
        .collect();
    assert_eq!(labels, vec!["Comercial", "Industrial"]);
    assert_eq!(body.user.permissions.get("comercial"), Some(&true));
    assert_eq!(body.user.permissions.get("industrial"), Some(&false));
}

#[tokio::test]
async fn test_userinfo_expands_master() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("bia@example.com", "app1").await;
    let token = exchange(&fixture, &code, "app1", APP1_SECRET).await.access_token;

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), format!("Bearer {token}").as_str())],
        )
        .await;
    resp.assert_ok();
    assert_eq!(
        resp.json["user"]["permissions"],
        json!({"comercial": true, "industrial": true, "master": true})
    );
}

#[tokio::test]
async fn test_userinfo_other_application_has_no_permissions() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app2").await;
    let token = exchange(&fixture, &code, "app2", APP2_SECRET).await.access_token;

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), format!("Bearer {token}").as_str())],
        )
        .await;
    resp.assert_ok();
    assert_eq!(resp.json["client_id"], "app2");
    assert_eq!(resp.json["user"]["permissions"], json!({}));
    assert_eq!(resp.json["user"]["modules"], json!([]));
}

#[tokio::test]
async fn test_userinfo_requires_bearer_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/sso/userinfo").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.json,
        json!({"ok": false, "message": "Missing bearer token"})
    );

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), "Bearer not-a-token")],
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_userinfo_rejects_expired_token() {
    let fixture = TestFixture::new().await;
    let config = signing_config();
    let claims = Claims::issue(&config, "u-1", "app1-api", Utc::now() - Duration::hours(2));
    let token = sign_token(&config, &claims).unwrap();

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), format!("Bearer {token}").as_str())],
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_userinfo_rejects_unregistered_audience() {
    let fixture = TestFixture::new().await;
    let config = signing_config();
    let claims = Claims::issue(&config, "u-1", "someone-else", Utc::now());
    let token = sign_token(&config, &claims).unwrap();

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), format!("Bearer {token}").as_str())],
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_userinfo_rejects_inactive_user() {
    let fixture = TestFixture::new().await;
    let code = fixture.issue_code("ana@example.com", "app1").await;
    let token = exchange(&fixture, &code, "app1", APP1_SECRET).await.access_token;
    fixture.store.set_user_active("u-1", false).await.unwrap();

    let resp = fixture
        .get_with_headers(
            "/api/sso/userinfo",
            &[(AUTHORIZATION.as_str(), format!("Bearer {token}").as_str())],
        )
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json["message"], "Invalid or inactive user");
}

#[tokio::test]
async fn test_exchange_without_configuration_is_internal_error() {
    let fixture = TestFixture::without_seed().await;
    let resp = fixture
        .post(
            "/api/sso/exchange",
            &json!({"code": "abc", "client_id": "app1", "client_secret": "x"}),
        )
        .await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.json,
        json!({"ok": false, "message": "Internal server error"})
    );
}
