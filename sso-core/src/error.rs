use thiserror::Error;

/// Failures of the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Authorization code already exists")]
    DuplicateCode,
}

/// Errors produced by the SSO broker operations.
///
/// Variants up to `UserInactive` are expected protocol outcomes and are
/// mapped to 4xx responses at the HTTP boundary. The remaining ones are
/// infrastructure or configuration faults.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("No active SSO signing configuration")]
    ConfigurationMissing,

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid or disabled client")]
    ClientInvalid,

    #[error("Invalid client_secret")]
    ClientUnauthorized,

    #[error("Client has no enabled redirect URL")]
    RedirectUnavailable,

    #[error("Redirect URL is not registered for this client")]
    RedirectNotAllowed,

    #[error("Invalid code")]
    CodeInvalid,

    #[error("Code already used")]
    CodeAlreadyUsed,

    #[error("Code expired")]
    CodeExpired,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Invalid or inactive user")]
    UserInactive,

    #[error("Permission store unavailable: {0}")]
    PermissionStoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl BrokerError {
    /// True for failures caused by the caller's input rather than by the broker itself
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BrokerError::ClientInvalid
                | BrokerError::ClientUnauthorized
                | BrokerError::RedirectUnavailable
                | BrokerError::RedirectNotAllowed
                | BrokerError::CodeInvalid
                | BrokerError::CodeAlreadyUsed
                | BrokerError::CodeExpired
                | BrokerError::TokenInvalid(_)
                | BrokerError::UserInactive
        )
    }
}

impl From<sqlx::Error> for BrokerError {
    fn from(err: sqlx::Error) -> Self {
        BrokerError::Storage(StoreError::Database(err))
    }
}
