use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusbill_core::{DomainError, DomainResult, Entity, SchoolId};

/// A school: the top-level account holder. Owns zero or more students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; `Some` means the row is excluded from all reads.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl School {
    pub fn new(
        name: impl Into<String>,
        address: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = normalized_name(name.into())?;
        Ok(Self {
            id: SchoolId::new(),
            name,
            address,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Apply a partial update; `None` keeps the existing value.
    pub fn update(
        &mut self,
        name: Option<String>,
        address: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(name) = name {
            self.name = normalized_name(name)?;
        }
        if let Some(address) = address {
            self.address = Some(address);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.deleted_at.is_some() {
            return Err(DomainError::conflict("school is already deleted"));
        }
        self.deleted_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Entity for School {
    type Id = SchoolId;

    fn id(&self) -> &SchoolId {
        &self.id
    }
}

fn normalized_name(name: String) -> DomainResult<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(DomainError::validation("school name cannot be empty"));
    }
    Ok(name)
}
