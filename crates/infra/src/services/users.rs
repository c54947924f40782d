//! Registration and credential checks for API users.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use campusbill_auth::{Role, User, hash_password, validate_password, verify_password};
use campusbill_core::UserId;

use crate::store::{StoreError, UserStore};

use super::BillingError;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Register a user with the default role. Email uniqueness is enforced
    /// by the store and surfaces as a conflict.
    #[instrument(skip(self, email, password), err)]
    pub async fn register(
        &self,
        email: String,
        full_name: String,
        password: String,
    ) -> Result<User, BillingError> {
        validate_password(&password)?;
        let password_hash =
            hash_password(&password).map_err(|e| BillingError::Invariant(e.to_string()))?;
        let user = User::new(email, full_name, password_hash, vec![Role::user()], Utc::now())?;
        self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => {
                BillingError::Conflict("email already registered".to_string())
            }
            other => BillingError::Store(other),
        })?;
        Ok(user)
    }

    /// Check credentials. A wrong email and a wrong password are
    /// indistinguishable to the caller.
    #[instrument(skip(self, email, password), err)]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, BillingError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.get_user_by_email(&email).await? else {
            return Err(BillingError::Unauthorized);
        };
        if !verify_password(password, &user.password_hash) {
            return Err(BillingError::Unauthorized);
        }
        Ok(user)
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn get(&self, id: UserId) -> Result<User, BillingError> {
        self.store.get_user(id).await?.ok_or(BillingError::NotFound)
    }
}
