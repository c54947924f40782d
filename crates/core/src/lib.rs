//! `campusbill-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model, and money arithmetic at
//! fixed currency precision.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{InvoiceId, InvoiceItemId, PaymentId, SchoolId, StudentId, UserId};
pub use value_object::ValueObject;
