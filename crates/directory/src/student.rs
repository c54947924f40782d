use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusbill_core::{DomainError, DomainResult, Entity, SchoolId, StudentId};

/// A student enrolled at exactly one school. Owns zero or more invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub school_id: SchoolId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; a deleted student drops out of every statement.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Student {
    pub fn new(
        school_id: SchoolId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let first_name = normalized_name(first_name.into(), "first name")?;
        let last_name = normalized_name(last_name.into(), "last name")?;
        let email = email.map(normalized_email).transpose()?;
        Ok(Self {
            id: StudentId::new(),
            school_id,
            first_name,
            last_name,
            email,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Apply a partial update; `None` keeps the existing value.
    pub fn update(
        &mut self,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(first_name) = first_name {
            self.first_name = normalized_name(first_name, "first name")?;
        }
        if let Some(last_name) = last_name {
            self.last_name = normalized_name(last_name, "last name")?;
        }
        if let Some(email) = email {
            self.email = Some(normalized_email(email)?);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.deleted_at.is_some() {
            return Err(DomainError::conflict("student is already deleted"));
        }
        self.deleted_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Display name used on statements.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Student {
    type Id = StudentId;

    fn id(&self) -> &StudentId {
        &self.id
    }
}

fn normalized_name(name: String, what: &str) -> DomainResult<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(DomainError::validation(format!("{what} cannot be empty")));
    }
    Ok(name)
}

fn normalized_email(email: String) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::validation("email must contain '@'"));
    }
    Ok(email)
}
