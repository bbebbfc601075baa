//! Account provisioning seam.
//!
//! The checkout core never signs users in. It only needs to look an account
//! up by e-mail, create one for a newly confirmed affiliate, and ask the
//! identity provider to send that account a password-reset e-mail.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Length of the throwaway credential set on auto-provisioned accounts.
const ONE_TIME_CREDENTIAL_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: String,
    pub email: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, ServiceError>;

    /// Creates an account protected by `credential`. Implementations must not
    /// persist or log the credential in clear text.
    async fn create_user(&self, email: &str, credential: &str) -> Result<UserAccount, ServiceError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError>;
}

/// Random credential for an account whose owner will pick a password through
/// the reset link. It is handed to the provider once and then dropped.
pub fn one_time_credential() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ONE_TIME_CREDENTIAL_LEN)
        .map(char::from)
        .collect()
}

/// Identity provider kept in process memory. Records which accounts were
/// sent a reset e-mail so flows can be asserted on.
#[derive(Debug, Default)]
pub struct InMemoryAuthProvider {
    users: DashMap<String, UserAccount>,
    reset_requests: DashMap<String, u32>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: &str, email: &str) -> Self {
        self.users.insert(
            email.to_lowercase(),
            UserAccount {
                id: id.to_string(),
                email: email.to_lowercase(),
            },
        );
        self
    }

    pub fn password_resets_sent(&self, email: &str) -> u32 {
        self.reset_requests
            .get(&email.to_lowercase())
            .map_or(0, |count| *count)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, ServiceError> {
        Ok(self.users.get(&email.to_lowercase()).map(|u| u.clone()))
    }

    async fn create_user(&self, email: &str, credential: &str) -> Result<UserAccount, ServiceError> {
        if credential.len() < ONE_TIME_CREDENTIAL_LEN {
            return Err(ServiceError::InvalidInput(
                "Credential too short for an auto-provisioned account".to_string(),
            ));
        }
        let key = email.to_lowercase();
        if self.users.contains_key(&key) {
            return Err(ServiceError::Conflict(format!("Account {} already exists", key)));
        }
        let account = UserAccount {
            id: Uuid::new_v4().to_string(),
            email: key.clone(),
        };
        self.users.insert(key, account.clone());
        Ok(account)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        *self.reset_requests.entry(email.to_lowercase()).or_insert(0) += 1;
        Ok(())
    }
}
