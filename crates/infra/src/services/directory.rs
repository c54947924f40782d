//! School and student management.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use campusbill_core::{SchoolId, StudentId};
use campusbill_directory::{School, Student};

use crate::store::{BillingStore, Page};

use super::BillingError;

/// School CRUD over a [`BillingStore`].
#[derive(Clone)]
pub struct SchoolService {
    store: Arc<dyn BillingStore>,
}

impl SchoolService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err)]
    pub async fn create(
        &self,
        name: String,
        address: Option<String>,
    ) -> Result<School, BillingError> {
        let school = School::new(name, address, Utc::now())?;
        self.store.insert_school(&school).await?;
        Ok(school)
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn get(&self, id: SchoolId) -> Result<School, BillingError> {
        self.store
            .get_school(id)
            .await?
            .ok_or(BillingError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&self) -> Result<Vec<School>, BillingError> {
        Ok(self.store.list_schools().await?)
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn update(
        &self,
        id: SchoolId,
        name: Option<String>,
        address: Option<String>,
    ) -> Result<School, BillingError> {
        let mut school = self.get(id).await?;
        school.update(name, address, Utc::now())?;
        if !self.store.update_school(&school).await? {
            return Err(BillingError::NotFound);
        }
        Ok(school)
    }

    /// Soft-delete a school. Its students and invoices stay untouched; reads
    /// exclude them through the school lookup instead.
    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn delete(&self, id: SchoolId) -> Result<(), BillingError> {
        let mut school = self.get(id).await?;
        school.mark_deleted(Utc::now())?;
        if !self.store.update_school(&school).await? {
            return Err(BillingError::NotFound);
        }
        Ok(())
    }
}

/// Student CRUD over a [`BillingStore`].
#[derive(Clone)]
pub struct StudentService {
    store: Arc<dyn BillingStore>,
}

impl StudentService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Enroll a student. The school must exist and be active.
    #[instrument(skip(self), fields(school_id = %school_id), err)]
    pub async fn create(
        &self,
        school_id: SchoolId,
        first_name: String,
        last_name: String,
        email: Option<String>,
    ) -> Result<Student, BillingError> {
        if self.store.get_school(school_id).await?.is_none() {
            return Err(BillingError::NotFound);
        }
        let student = Student::new(school_id, first_name, last_name, email, Utc::now())?;
        self.store.insert_student(&student).await?;
        Ok(student)
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn get(&self, id: StudentId) -> Result<Student, BillingError> {
        self.store
            .get_student(id)
            .await?
            .ok_or(BillingError::NotFound)
    }

    #[instrument(skip(self), fields(school_id = %school_id), err)]
    pub async fn list(
        &self,
        school_id: SchoolId,
        page: Page,
    ) -> Result<Vec<Student>, BillingError> {
        if self.store.get_school(school_id).await?.is_none() {
            return Err(BillingError::NotFound);
        }
        Ok(self.store.list_students(school_id, page).await?)
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn update(
        &self,
        id: StudentId,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
    ) -> Result<Student, BillingError> {
        let mut student = self.get(id).await?;
        student.update(first_name, last_name, email, Utc::now())?;
        if !self.store.update_student(&student).await? {
            return Err(BillingError::NotFound);
        }
        Ok(student)
    }

    /// Soft-delete a student. Their invoices stop counting toward school
    /// statements from this point on.
    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn delete(&self, id: StudentId) -> Result<(), BillingError> {
        let mut student = self.get(id).await?;
        student.mark_deleted(Utc::now())?;
        if !self.store.update_student(&student).await? {
            return Err(BillingError::NotFound);
        }
        Ok(())
    }
}
