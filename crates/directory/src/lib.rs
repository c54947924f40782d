//! Directory domain module (schools and their students).
//!
//! This crate contains business rules for the ownership hierarchy that billing
//! hangs off of, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). Rows are never erased; deletion sets `deleted_at`.

pub mod school;
pub mod student;

pub use school::School;
pub use student::Student;
