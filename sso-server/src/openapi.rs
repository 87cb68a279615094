use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const SSO_TAG: &str = "SSO API";
pub(crate) const LOGIN_TAG: &str = "Login";

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::health::health_check,
        crate::api::health::ready_check,
        crate::api::login::login_form,
        crate::api::login::login_submit,
        crate::api::login::logout,
        crate::api::sso::handlers::start_handler,
        crate::api::sso::handlers::exchange_handler,
        crate::api::sso::handlers::userinfo_handler,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = SSO_TAG, description = "Authorization code exchange and userinfo for relying parties"),
        (name = LOGIN_TAG, description = "Browser login and SSO start endpoints"),
    ),
    info(
        title = "SSO Identity Provider API",
        description = "Federated single sign-on broker",
        version = "1.0.0"
    )
)]
pub(crate) struct ApiDoc;
