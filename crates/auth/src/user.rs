//! API user entity.
//!
//! Users gate the HTTP surface; they are not part of the billing ownership
//! hierarchy. Credentials are stored only as bcrypt hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusbill_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

/// Minimum accepted password length, checked before hashing.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A registered API user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    /// bcrypt hash; the plaintext never leaves the registration path.
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: String,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let email = normalized_email(email.into())?;
        let full_name = full_name.into().trim().to_string();
        if full_name.is_empty() {
            return Err(DomainError::validation("full name cannot be empty"));
        }
        Ok(Self {
            id: UserId::new(),
            email,
            full_name,
            password_hash,
            roles,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

/// Password policy check, applied to the plaintext before hashing.
pub fn validate_password(plain: &str) -> DomainResult<()> {
    if plain.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn normalized_email(email: String) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::validation("email must contain '@'"));
    }
    Ok(email)
}
