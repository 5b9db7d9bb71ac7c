//! Account store backed by key-value storage
//!
//! Three independent storages are used:
//! - accounts by id (new accounts expire until their first update)
//! - the WebID → account id index used for ownership checks
//! - session cookies → account id, with a sliding expiry

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Account, AccountStore};
use crate::storage::{ExpiringStorage, KeyValueStorage, MemoryStorage};
use crate::types::{GatehouseError, Result};

/// How long a freshly created account survives without being updated
pub const ACCOUNT_EXPIRATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default session cookie lifetime in minutes (two weeks)
pub const DEFAULT_COOKIE_TTL_MINUTES: u64 = 20160;

/// Default `AccountStore` implementation
pub struct BaseAccountStore {
    accounts: Arc<dyn ExpiringStorage<Account>>,
    web_ids: Arc<dyn KeyValueStorage<String>>,
    cookies: Arc<dyn ExpiringStorage<String>>,
    cookie_ttl: Duration,
}

impl BaseAccountStore {
    /// Create a store on top of the given storages
    pub fn new(
        accounts: Arc<dyn ExpiringStorage<Account>>,
        web_ids: Arc<dyn KeyValueStorage<String>>,
        cookies: Arc<dyn ExpiringStorage<String>>,
        cookie_ttl_minutes: u64,
    ) -> Self {
        Self {
            accounts,
            web_ids,
            cookies,
            cookie_ttl: Duration::from_secs(cookie_ttl_minutes.saturating_mul(60)),
        }
    }

    /// Create a store that keeps everything in process memory
    pub fn in_memory(cookie_ttl_minutes: u64) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            cookie_ttl_minutes,
        )
    }

    /// Reject WebIDs that the index already assigns to a different account
    async fn ensure_web_ids_unclaimed(&self, old: &Account, account: &Account) -> Result<()> {
        for web_id in account.web_ids.keys() {
            if old.web_ids.contains_key(web_id) {
                continue;
            }
            if let Some(owner) = self.web_ids.get(web_id).await? {
                if owner != account.id {
                    return Err(GatehouseError::Conflict(format!(
                        "{} is already linked to another account.",
                        web_id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for BaseAccountStore {
    async fn create(&self) -> Result<Account> {
        let account = Account::new(Uuid::new_v4().to_string());
        self.accounts
            .set_expiring(&account.id, account.clone(), Some(ACCOUNT_EXPIRATION))
            .await?;
        info!("Created account {}", account.id);
        Ok(account)
    }

    async fn find(&self, id: &str) -> Result<Option<Account>> {
        self.accounts.get(id).await
    }

    async fn update(&self, account: &Account) -> Result<()> {
        let old = self.accounts.get(&account.id).await?.ok_or_else(|| {
            GatehouseError::NotFound(format!("Unknown account {}", account.id))
        })?;

        if account.logins.is_empty() {
            return Err(GatehouseError::BadRequest(
                "An account needs at least 1 login method.".to_string(),
            ));
        }

        self.ensure_web_ids_unclaimed(&old, account).await?;

        // Plain set: a completed account no longer expires
        self.accounts.set(&account.id, account.clone()).await?;

        for web_id in old.web_ids.keys() {
            if !account.web_ids.contains_key(web_id) {
                self.web_ids.delete(web_id).await?;
            }
        }
        for web_id in account.web_ids.keys() {
            if !old.web_ids.contains_key(web_id) {
                self.web_ids.set(web_id, account.id.clone()).await?;
            }
        }

        debug!("Updated account {}", account.id);
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        // Would also require removing the linked WebIDs, pods and logins
        Err(GatehouseError::NotImplemented(
            "Delete not supported yet.".to_string(),
        ))
    }

    async fn find_by_web_id(&self, web_id: &str) -> Result<Option<String>> {
        self.web_ids.get(web_id).await
    }

    async fn find_by_cookie(&self, cookie: &str) -> Result<Option<String>> {
        let account_id = self.cookies.get(cookie).await?;
        if let Some(ref id) = account_id {
            self.cookies
                .set_expiring(cookie, id.clone(), Some(self.cookie_ttl))
                .await?;
        }
        Ok(account_id)
    }

    async fn generate_cookie(&self, account_id: &str) -> Result<String> {
        let cookie = Uuid::new_v4().to_string();
        self.cookies
            .set_expiring(&cookie, account_id.to_string(), Some(self.cookie_ttl))
            .await?;
        Ok(cookie)
    }

    async fn delete_cookie(&self, cookie: &str) -> Result<bool> {
        self.cookies.delete(cookie).await
    }
}
