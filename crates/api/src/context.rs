use campusbill_auth::Role;
use campusbill_core::UserId;

/// Authenticated identity for a request, derived from the bearer token.
///
/// Inserted by the auth middleware and must be present on all protected
/// routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
