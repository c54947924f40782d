//! Persistence boundary for billing data.
//!
//! [`traits`] defines the storage contracts, [`in_memory`] and [`postgres`]
//! implement them, and [`cached`] (feature `redis`) decorates any
//! `BillingStore` with a statement cache.

pub mod in_memory;
pub mod postgres;
pub mod traits;

#[cfg(feature = "redis")]
pub mod cached;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use traits::{BillingStore, Page, PaymentAppend, StoreError, UserStore};

#[cfg(feature = "redis")]
pub use cached::CachedBillingStore;
