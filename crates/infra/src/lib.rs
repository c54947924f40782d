//! Infrastructure for the billing platform: storage backends and the
//! application services the HTTP layer calls.
//!
//! The [`store`] module owns persistence behind the `BillingStore` and
//! `UserStore` traits, with an in-memory backend for tests/dev, a Postgres
//! backend for production, and an optional Redis-backed statement cache.
//! The [`services`] module owns orchestration: existence checks, the payment
//! gate, item rules, and statement assembly.

pub mod services;
pub mod store;
