use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use bolo_types::api::Claims;

use crate::error::AuthError;

/// Tokens issued at login/registration stay valid for 30 days.
const TOKEN_TTL_DAYS: i64 = 30;

/// Issues and verifies HS256 bearer tokens against one shared secret.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<AuthenticatorInner>,
}

struct AuthenticatorInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            inner: Arc::new(AuthenticatorInner {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation: Validation::default(),
            }),
        }
    }

    /// Verify signature and expiry, returning the claims. Every failure,
    /// including a missing token, maps to the same `AuthError`.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<Claims, AuthError> {
        let token = credential.map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError)?;

        let data = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                AuthError
            })?;

        if data.claims.sub.trim().is_empty() {
            debug!("Rejected bearer token with empty subject");
            return Err(AuthError);
        }

        Ok(data.claims)
    }

    pub fn issue(&self, user_id: &str, username: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.inner.encoding)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(secret: &str, sub: &str, exp: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            username: "alice".into(),
            exp: exp as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_round_trips_subject() {
        let auth = Authenticator::new("s3cret");
        let token = auth.issue("u1", "alice").unwrap();

        let claims = auth.authenticate(Some(&token)).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn missing_or_blank_token_is_rejected() {
        let auth = Authenticator::new("s3cret");
        assert!(auth.authenticate(None).is_err());
        assert!(auth.authenticate(Some("   ")).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let auth = Authenticator::new("s3cret");
        assert!(auth.authenticate(Some("not.a.jwt")).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let auth = Authenticator::new("s3cret");
        let forged = Authenticator::new("other").issue("u1", "alice").unwrap();
        assert!(auth.authenticate(Some(&forged)).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = Authenticator::new("s3cret");
        let expired = token_with("s3cret", "u1", chrono::Utc::now().timestamp() - 3600);
        assert!(auth.authenticate(Some(&expired)).is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let auth = Authenticator::new("s3cret");
        let token = token_with("s3cret", "", chrono::Utc::now().timestamp() + 3600);
        assert!(auth.authenticate(Some(&token)).is_err());
    }
}
