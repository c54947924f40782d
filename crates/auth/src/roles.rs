use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role granted to an API user.
///
/// Roles are opaque strings at this layer; they ride along in JWT claims and
/// on the user record. The billing routes only require an authenticated
/// principal, so roles carry no route-level policy today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Default role every registered user holds.
    pub fn user() -> Self {
        Self::new("user")
    }

    pub fn admin() -> Self {
        Self::new("admin")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
