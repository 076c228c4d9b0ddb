use axum::http::HeaderValue;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::error::GatewayError;
use crate::services::auth::Identity;

/// Why a bearer token was rejected. All variants surface as 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("missing token")]
    Missing,
    #[error("invalid token")]
    Invalid,
    #[error("expired token")]
    Expired { subject: String },
}

impl From<TokenError> for GatewayError {
    fn from(e: TokenError) -> Self {
        GatewayError::unauthorized(e.to_string())
    }
}

/// Access token claims.
///
/// Only `exp` is mandatory. A token without `role` is a valid, non-admin token.
#[derive(Debug, Clone, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    sub: String,
    exp: i64,
    #[serde(default)]
    role: String,
}

/// HS256 bearer-token verifier.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is compared in `verify_at` with whole seconds and no leeway:
        // a token expiring exactly now is already expired.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key,
            validation,
        }
    }

    /// Authenticate the raw `Authorization` header value against the current time.
    pub fn authenticate(&self, header: Option<&HeaderValue>) -> Result<Identity, GatewayError> {
        self.authenticate_at(header, chrono::Utc::now().timestamp())
    }

    /// Same as `authenticate`, with `now` in epoch seconds.
    ///
    /// Emits one authentication outcome record per call.
    pub fn authenticate_at(
        &self,
        header: Option<&HeaderValue>,
        now: i64,
    ) -> Result<Identity, GatewayError> {
        match self.verify_at(header, now) {
            Ok(identity) => {
                tracing::info!(
                    outcome = "pass",
                    subject = %identity.subject,
                    role = %identity.role,
                    "authentication"
                );
                Ok(identity)
            }
            Err(err) => {
                match &err {
                    TokenError::Expired { subject } => tracing::warn!(
                        outcome = "fail",
                        reason = %err,
                        subject = %subject,
                        "authentication"
                    ),
                    _ => tracing::warn!(outcome = "fail", reason = %err, "authentication"),
                }
                Err(err.into())
            }
        }
    }

    pub fn verify_at(&self, header: Option<&HeaderValue>, now: i64) -> Result<Identity, TokenError> {
        let token = bearer_token(header).ok_or(TokenError::Missing)?;

        let claims =
            jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
                .map_err(|err| {
                    tracing::debug!(error = %err, "token rejected by verifier");
                    TokenError::Invalid
                })?
                .claims;

        if claims.exp <= now {
            return Err(TokenError::Expired {
                subject: claims.sub,
            });
        }

        Ok(Identity::new(
            claims.sub,
            claims.role,
            claims.exp,
            token.to_string(),
        ))
    }
}

/// Extract the token from `Bearer <token>`. The scheme is case-insensitive.
pub fn bearer_token(header: Option<&HeaderValue>) -> Option<&str> {
    let value = header?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";
    const NOW: i64 = 1_700_000_000;

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign")
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header")
    }

    fn authenticator() -> TokenAuthenticator {
        TokenAuthenticator::new(SECRET)
    }

    #[test]
    fn missing_header_is_missing_token() {
        let err = authenticator().verify_at(None, NOW).expect_err("missing");
        assert_eq!(err, TokenError::Missing);
    }

    #[test]
    fn non_bearer_scheme_is_missing_token() {
        let header = HeaderValue::from_static("Basic dXNlcjpwYXNz");
        let err = authenticator()
            .verify_at(Some(&header), NOW)
            .expect_err("basic");
        assert_eq!(err, TokenError::Missing);

        let empty = HeaderValue::from_static("Bearer   ");
        let err = authenticator()
            .verify_at(Some(&empty), NOW)
            .expect_err("empty");
        assert_eq!(err, TokenError::Missing);
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let token = sign(json!({"sub": "u1", "exp": NOW + 60, "role": "ADMIN"}), "other");
        let err = authenticator()
            .verify_at(Some(&bearer(&token)), NOW)
            .expect_err("bad sig");
        assert_eq!(err, TokenError::Invalid);
    }

    #[test]
    fn malformed_token_is_invalid() {
        let err = authenticator()
            .verify_at(Some(&bearer("not.a.jwt")), NOW)
            .expect_err("malformed");
        assert_eq!(err, TokenError::Invalid);
    }

    #[test]
    fn token_without_exp_is_invalid() {
        let token = sign(json!({"sub": "u1", "role": "ADMIN"}), SECRET);
        let err = authenticator()
            .verify_at(Some(&bearer(&token)), NOW)
            .expect_err("no exp");
        assert_eq!(err, TokenError::Invalid);
    }

    #[test]
    fn past_expiry_is_expired() {
        let token = sign(json!({"sub": "u1", "exp": NOW - 10}), SECRET);
        let err = authenticator()
            .verify_at(Some(&bearer(&token)), NOW)
            .expect_err("expired");
        assert_eq!(
            err,
            TokenError::Expired {
                subject: "u1".to_string()
            }
        );
    }

    #[test]
    fn expiry_equal_to_now_is_expired() {
        let token = sign(json!({"sub": "u1", "exp": NOW}), SECRET);
        let err = authenticator()
            .verify_at(Some(&bearer(&token)), NOW)
            .expect_err("expired");
        assert!(matches!(err, TokenError::Expired { .. }));
    }

    #[test]
    fn valid_token_yields_identity() {
        let token = sign(json!({"sub": "u1", "exp": NOW + 1, "role": "USER"}), SECRET);
        let identity = authenticator()
            .verify_at(Some(&bearer(&token)), NOW)
            .expect("identity");
        assert_eq!(identity.subject, "u1");
        assert_eq!(identity.role, "USER");
        assert_eq!(identity.expires_at, NOW + 1);
        assert_eq!(identity.token(), token);
    }

    #[test]
    fn lowercase_scheme_is_accepted() {
        let token = sign(json!({"sub": "u1", "exp": NOW + 60}), SECRET);
        let header = HeaderValue::from_str(&format!("bearer {token}")).expect("header");
        assert!(authenticator().verify_at(Some(&header), NOW).is_ok());
    }

    #[test]
    fn failures_map_to_unauthorized() {
        let err = authenticator()
            .authenticate_at(None, NOW)
            .expect_err("missing");
        assert_eq!(err, GatewayError::unauthorized("missing token"));
    }
}
