//! Signing and verification of the audience-bound access tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::error::BrokerError;
use crate::models::{Claims, SigningConfig};

const REQUIRED_CLAIMS: [&str; 5] = ["exp", "iat", "iss", "aud", "sub"];

impl Claims {
    pub fn issue(config: &SigningConfig, user_id: &str, audience: &str, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            sub: user_id.to_string(),
            iss: config.issuer.clone(),
            aud: audience.to_string(),
            iat,
            exp: iat + config.jwt_ttl_secs,
        }
    }
}

/// Signs `claims` with the configured HMAC algorithm and secret.
pub fn sign_token(config: &SigningConfig, claims: &Claims) -> Result<String, BrokerError> {
    let algorithm = config.algorithm()?;
    if config.jwt_secret.is_empty() {
        return Err(BrokerError::ConfigurationMissing);
    }
    encode(
        &Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| BrokerError::Signing(e.to_string()))
}

/// Verifies signature, issuer, audience and expiry in a single decode.
///
/// The token is accepted only if its `aud` is one of `expected_audiences`.
/// Expiry is checked without leeway.
pub fn validate_token(
    config: &SigningConfig,
    token: &str,
    expected_audiences: &[String],
) -> Result<Claims, BrokerError> {
    let algorithm = config.algorithm()?;
    if config.jwt_secret.is_empty() {
        return Err(BrokerError::ConfigurationMissing);
    }

    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&REQUIRED_CLAIMS);
    validation.set_issuer(&[config.issuer.as_str()]);
    validation.set_audience(expected_audiences);

    let data = decode::<Claims>(
        token.trim(),
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| BrokerError::TokenInvalid(e.to_string()))?;

    let claims = data.claims;
    if claims.sub.trim().is_empty() {
        return Err(BrokerError::TokenInvalid("Missing sub".to_string()));
    }
    if claims.aud.trim().is_empty() {
        return Err(BrokerError::TokenInvalid("Missing aud".to_string()));
    }
    Ok(claims)
}
