//! Entity trait: identity + continuity across state changes.
//!
//! Billing entities keep their identity through updates and soft-deletion;
//! a soft-deleted row is still the same entity, just excluded from reads.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
