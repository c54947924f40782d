//! Statement assembly.
//!
//! The heavy lifting (grouped sums, ordering) happens in the store; this
//! service adds existence checks and the roll-up totals.

use std::sync::Arc;

use tracing::instrument;

use campusbill_billing::{SchoolStatement, StatementPeriod, StatementTotals, StudentStatement};
use campusbill_core::{SchoolId, StudentId};

use crate::store::BillingStore;

use super::BillingError;

#[derive(Clone)]
pub struct StatementService {
    store: Arc<dyn BillingStore>,
}

impl StatementService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Per-invoice balances and totals for one active student.
    #[instrument(skip(self), fields(student_id = %student_id), err)]
    pub async fn student_statement(
        &self,
        student_id: StudentId,
        period: StatementPeriod,
    ) -> Result<StudentStatement, BillingError> {
        let student = self
            .store
            .get_student(student_id)
            .await?
            .ok_or(BillingError::NotFound)?;
        let rows = self.store.student_statement_rows(student_id, period).await?;
        let totals = StatementTotals::from_rows(&rows)?;
        Ok(StudentStatement {
            student_id,
            student_name: student.full_name(),
            rows,
            totals,
        })
    }

    /// Roll-up across all active students of a school, computed as one
    /// grouped aggregation per request. Row detail is returned only when
    /// asked for.
    #[instrument(skip(self), fields(school_id = %school_id), err)]
    pub async fn school_statement(
        &self,
        school_id: SchoolId,
        period: StatementPeriod,
        include_invoices: bool,
    ) -> Result<SchoolStatement, BillingError> {
        let school = self
            .store
            .get_school(school_id)
            .await?
            .ok_or(BillingError::NotFound)?;
        let rows = self.store.school_statement_rows(school_id, period).await?;
        let totals = StatementTotals::from_rows(&rows)?;
        let student_count = self.store.count_students(school_id).await?;
        Ok(SchoolStatement {
            school_id,
            school_name: school.name,
            student_count,
            totals,
            rows: include_invoices.then_some(rows),
        })
    }
}
