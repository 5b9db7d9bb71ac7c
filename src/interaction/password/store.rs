use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::PasswordStore;
use crate::auth::PasswordHasher;
use crate::storage::{ExpiringStorage, KeyValueStorage, MemoryStorage};
use crate::types::{GatehouseError, Result};

pub const DEFAULT_FORGOT_PASSWORD_EXPIRATION_MINUTES: u64 = 15;

/// Stored email/password login
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub account_id: String,
    pub email: String,
    /// Argon2 PHC hash
    pub password: String,
    pub verified: bool,
}

/// Stored password reset request
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordPayload {
    pub email: String,
    pub record_id: String,
}

/// `PasswordStore` on top of key-value storage
pub struct BasePasswordStore {
    storage: Arc<dyn KeyValueStorage<LoginPayload>>,
    forgot_password_storage: Arc<dyn ExpiringStorage<ForgotPasswordPayload>>,
    hasher: PasswordHasher,
    forgot_password_expiration: Duration,
}

impl BasePasswordStore {
    pub fn new(
        storage: Arc<dyn KeyValueStorage<LoginPayload>>,
        forgot_password_storage: Arc<dyn ExpiringStorage<ForgotPasswordPayload>>,
        hasher: PasswordHasher,
        forgot_password_expiration_minutes: u64,
    ) -> Self {
        Self {
            storage,
            forgot_password_storage,
            hasher,
            forgot_password_expiration: Duration::from_secs(
                forgot_password_expiration_minutes.saturating_mul(60),
            ),
        }
    }

    pub fn in_memory(hasher: PasswordHasher, forgot_password_expiration_minutes: u64) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            hasher,
            forgot_password_expiration_minutes,
        )
    }

    fn login_key(email: &str) -> String {
        format!("email/{}", urlencoding::encode(email))
    }

    fn forgot_password_key(record_id: &str) -> String {
        format!(
            "forgot-password-resource-identifier/{}",
            urlencoding::encode(record_id)
        )
    }

    async fn get_login(&self, email: &str) -> Result<(String, LoginPayload)> {
        let key = Self::login_key(email);
        let payload = self
            .storage
            .get(&key)
            .await?
            .ok_or_else(|| GatehouseError::BadRequest("Login does not exist.".to_string()))?;
        Ok((key, payload))
    }
}

#[async_trait]
impl PasswordStore for BasePasswordStore {
    async fn authenticate(&self, email: &str, password: &str) -> Result<String> {
        let (_, payload) = self.get_login(email).await?;
        if !payload.verified {
            return Err(GatehouseError::BadRequest(
                "Login still needs to be verified.".to_string(),
            ));
        }
        if !self.hasher.verify(password, &payload.password)? {
            return Err(GatehouseError::BadRequest("Incorrect password.".to_string()));
        }
        Ok(payload.account_id)
    }

    async fn create(&self, email: &str, account_id: &str, password: &str) -> Result<()> {
        let key = Self::login_key(email);
        if self.storage.get(&key).await?.is_some() {
            return Err(GatehouseError::Conflict(
                "There already is a login for this email address.".to_string(),
            ));
        }
        let payload = LoginPayload {
            account_id: account_id.to_string(),
            email: email.to_string(),
            password: self.hasher.hash(password)?,
            verified: false,
        };
        self.storage.set(&key, payload).await
    }

    async fn verify(&self, email: &str) -> Result<()> {
        let (key, mut payload) = self.get_login(email).await?;
        payload.verified = true;
        self.storage.set(&key, payload).await
    }

    async fn change_password(&self, email: &str, password: &str) -> Result<()> {
        let (key, mut payload) = self.get_login(email).await?;
        payload.password = self.hasher.hash(password)?;
        self.storage.set(&key, payload).await
    }

    async fn delete(&self, email: &str) -> Result<bool> {
        self.storage.delete(&Self::login_key(email)).await
    }

    async fn generate_forgot_password_record(&self, email: &str) -> Result<String> {
        self.get_login(email).await?;
        let record_id = Uuid::new_v4().to_string();
        self.forgot_password_storage
            .set_expiring(
                &Self::forgot_password_key(&record_id),
                ForgotPasswordPayload {
                    email: email.to_string(),
                    record_id: record_id.clone(),
                },
                Some(self.forgot_password_expiration),
            )
            .await?;
        debug!("Generated password reset record for {}", email);
        Ok(record_id)
    }

    async fn get_forgot_password_record(&self, record_id: &str) -> Result<Option<String>> {
        Ok(self
            .forgot_password_storage
            .get(&Self::forgot_password_key(record_id))
            .await?
            .map(|record| record.email))
    }

    async fn delete_forgot_password_record(&self, record_id: &str) -> Result<()> {
        self.forgot_password_storage
            .delete(&Self::forgot_password_key(record_id))
            .await?;
        Ok(())
    }
}
