use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use campusbill_core::UserId;

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
///
/// Trait seam so the HTTP middleware never depends on a concrete codec.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>)
    -> Result<JwtClaims, TokenValidationError>;
}

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// HS256 JWT codec over a shared secret.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks are delegated to validate_claims, against a
        // caller-supplied clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(
        &self,
        user_id: UserId,
        roles: Vec<Role>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenIssueError> {
        let claims = JwtClaims {
            sub: user_id,
            roles,
            issued_at: now,
            expires_at: now + ttl,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenIssueError::Signing(e.to_string()))
    }
}

impl TokenValidator for Hs256TokenCodec {
    fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| TokenValidationError::Malformed)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> Hs256TokenCodec {
        Hs256TokenCodec::new(b"test-secret")
    }

    #[test]
    fn issued_tokens_validate_and_round_trip_claims() {
        let codec = test_codec();
        let user_id = UserId::new();
        let now = Utc::now();

        let token = codec
            .issue(user_id, vec![Role::user(), Role::admin()], now, Duration::minutes(60))
            .unwrap();
        let claims = codec.validate(&token, now).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.roles, vec![Role::user(), Role::admin()]);
    }

    #[test]
    fn rejects_tokens_signed_with_a_different_secret() {
        let now = Utc::now();
        let token = test_codec()
            .issue(UserId::new(), vec![Role::user()], now, Duration::minutes(60))
            .unwrap();

        let other = Hs256TokenCodec::new(b"other-secret");
        assert_eq!(
            other.validate(&token, now).unwrap_err(),
            TokenValidationError::Malformed
        );
    }

    #[test]
    fn rejects_expired_tokens() {
        let codec = test_codec();
        let issued = Utc::now() - Duration::hours(2);
        let token = codec
            .issue(UserId::new(), vec![Role::user()], issued, Duration::hours(1))
            .unwrap();

        assert_eq!(
            codec.validate(&token, Utc::now()).unwrap_err(),
            TokenValidationError::Expired
        );
    }

    #[test]
    fn rejects_garbage_tokens() {
        assert_eq!(
            test_codec().validate("not.a.jwt", Utc::now()).unwrap_err(),
            TokenValidationError::Malformed
        );
    }
}
