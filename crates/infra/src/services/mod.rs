//! Application services: the operations the HTTP layer exposes.
//!
//! Services own orchestration and policy (existence checks, the payment
//! amount gate, item rules) and delegate persistence to the store traits.
//! Each service holds its store handle explicitly; nothing here reaches for
//! globals.

pub mod directory;
pub mod invoices;
pub mod payments;
pub mod statements;
pub mod users;

pub use directory::{SchoolService, StudentService};
pub use invoices::{InvoiceDetails, InvoiceService, NewInvoiceItem};
pub use payments::{PaymentReceipt, PaymentService};
pub use statements::StatementService;
pub use users::UserService;

use rust_decimal::Decimal;
use thiserror::Error;

use campusbill_core::DomainError;

use crate::store::StoreError;

/// Service-level error: the union of domain failures and store failures.
///
/// The HTTP layer maps each variant to a status code; [`BillingError::Store`]
/// is the only one whose detail never reaches a client.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("not found")]
    NotFound,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("payment would exceed invoice total (remaining: {remaining})")]
    Overpayment { remaining: Decimal },

    #[error("{0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("{0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DomainError> for BillingError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => BillingError::Validation(msg),
            DomainError::InvariantViolation(msg) => BillingError::Invariant(msg),
            DomainError::InvalidId(msg) => BillingError::Validation(msg),
            DomainError::InvalidAmount(msg) => BillingError::InvalidAmount(msg),
            DomainError::Overpayment { remaining } => BillingError::Overpayment { remaining },
            DomainError::NotFound => BillingError::NotFound,
            DomainError::Conflict(msg) => BillingError::Conflict(msg),
            DomainError::Unauthorized => BillingError::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use campusbill_core::DomainError;

    use super::BillingError;

    #[test]
    fn domain_errors_map_onto_service_errors() {
        let overpaid = BillingError::from(DomainError::Overpayment {
            remaining: Decimal::new(1050, 2),
        });
        match overpaid {
            BillingError::Overpayment { remaining } => {
                assert_eq!(remaining, Decimal::new(1050, 2));
            }
            other => panic!("expected Overpayment, got {other:?}"),
        }

        assert!(matches!(
            BillingError::from(DomainError::NotFound),
            BillingError::NotFound
        ));
        assert!(matches!(
            BillingError::from(DomainError::invalid_amount("zero")),
            BillingError::InvalidAmount(_)
        ));
        assert!(matches!(
            BillingError::from(DomainError::invalid_id("not a uuid")),
            BillingError::Validation(_)
        ));
    }
}
