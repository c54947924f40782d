use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campusbill_core::UserId;

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// `iat`/`exp` serialize as epoch seconds so any standard JWT tooling can
/// read the token; the time-window check itself lives in [`validate_claims`]
/// so it stays deterministic and testable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    /// Roles granted to the user.
    pub roles: Vec<Role>,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token is malformed or its signature is invalid")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims against a supplied clock.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// is the codec's job.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_claims(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            roles: vec![Role::user()],
            issued_at,
            expires_at,
        }
    }

    #[test]
    fn accepts_claims_inside_the_window() {
        let now = Utc::now();
        let claims = test_claims(now - Duration::minutes(5), now + Duration::minutes(55));
        validate_claims(&claims, now).unwrap();
    }

    #[test]
    fn rejects_expired_and_not_yet_valid_claims() {
        let now = Utc::now();

        let expired = test_claims(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(
            validate_claims(&expired, now).unwrap_err(),
            TokenValidationError::Expired
        );

        let future = test_claims(now + Duration::minutes(5), now + Duration::hours(1));
        assert_eq!(
            validate_claims(&future, now).unwrap_err(),
            TokenValidationError::NotYetValid
        );
    }

    #[test]
    fn rejects_inverted_time_window() {
        let now = Utc::now();
        let inverted = test_claims(now, now - Duration::minutes(1));
        assert_eq!(
            validate_claims(&inverted, now).unwrap_err(),
            TokenValidationError::InvalidTimeWindow
        );
    }

    #[test]
    fn timestamps_serialize_as_epoch_seconds() {
        let now = Utc::now();
        let claims = test_claims(now, now + Duration::hours(1));
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["iat"], serde_json::json!(claims.issued_at.timestamp()));
        assert_eq!(value["exp"], serde_json::json!(claims.expires_at.timestamp()));
    }
}
