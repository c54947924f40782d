//! `campusbill-auth` — authentication boundary for the billing API.
//!
//! This crate is intentionally decoupled from HTTP and storage: claims
//! validation is pure, the HS256 codec only signs/verifies, and the user
//! entity knows nothing about how it is persisted.

pub mod claims;
pub mod password;
pub mod roles;
pub mod token;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::{hash_password, verify_password};
pub use roles::Role;
pub use token::{Hs256TokenCodec, TokenIssueError, TokenValidator};
pub use user::{User, validate_password};
