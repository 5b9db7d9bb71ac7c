//! Accounts: the identity root owning logins, pods, WebIDs and credential tokens
//!
//! An `Account` is a plain value. Handlers `find` it, mutate a copy and hand it
//! back to `update`, which is the single place where account invariants are
//! checked.

mod store;

pub use store::{BaseAccountStore, ACCOUNT_EXPIRATION, DEFAULT_COOKIE_TTL_MINUTES};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{GatehouseError, Result};

/// Name of the password login method in `Account::logins`
pub const PASSWORD_LOGIN_METHOD: &str = "password";

/// Account document
///
/// Every map points from a key to the discovery URL of the resource that
/// manages that entry.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque identifier, immutable after creation
    pub id: String,

    /// Login method name → management URL
    #[serde(default)]
    pub logins: BTreeMap<String, String>,

    /// Pod base URL → management URL
    #[serde(default)]
    pub pods: BTreeMap<String, String>,

    /// WebID → management URL
    #[serde(default)]
    pub web_ids: BTreeMap<String, String>,

    /// Credential token id → management URL
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

impl Account {
    /// Create an empty account with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Find the pod base URL under which `url` lives, if this account owns one
    pub fn owning_pod(&self, url: &str) -> Option<&str> {
        self.pods
            .keys()
            .find(|pod| url.starts_with(pod.as_str()))
            .map(String::as_str)
    }

    /// Find the WebID whose management URL equals `url`
    pub fn web_id_for_url(&self, url: &str) -> Option<&str> {
        find_key_by_value(&self.web_ids, url)
    }

    /// Find the credential token id whose management URL equals `url`
    pub fn credential_for_url(&self, url: &str) -> Option<&str> {
        find_key_by_value(&self.credentials, url)
    }
}

fn find_key_by_value<'a>(map: &'a BTreeMap<String, String>, value: &str) -> Option<&'a str> {
    map.iter()
        .find(|(_, v)| v.as_str() == value)
        .map(|(k, _)| k.as_str())
}

/// Persistence contract for accounts, their WebID index and session cookies
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create and persist a new empty account
    ///
    /// The record expires unless it is updated within `ACCOUNT_EXPIRATION`.
    async fn create(&self) -> Result<Account>;

    /// Find an account by id
    async fn find(&self, id: &str) -> Result<Option<Account>>;

    /// Replace a stored account
    ///
    /// Fails with `NotFound` if the account does not exist and with
    /// `BadRequest` if it would end up without login methods.
    async fn update(&self, account: &Account) -> Result<()>;

    /// Account deletion is not supported
    async fn delete(&self, id: &str) -> Result<()>;

    /// Find the id of the account that linked this WebID
    async fn find_by_web_id(&self, web_id: &str) -> Result<Option<String>>;

    /// Resolve a session cookie, refreshing its expiry on success
    async fn find_by_cookie(&self, cookie: &str) -> Result<Option<String>>;

    /// Generate a new session cookie for the account
    async fn generate_cookie(&self, account_id: &str) -> Result<String>;

    /// Remove a session cookie, returning whether it existed
    async fn delete_cookie(&self, cookie: &str) -> Result<bool>;
}

/// Load the account of the requesting agent, failing if nobody is logged in
pub async fn get_required_account(
    store: &dyn AccountStore,
    account_id: Option<&str>,
) -> Result<Account> {
    let account = match account_id {
        Some(id) => store.find(id).await?,
        None => None,
    };
    account.ok_or_else(|| {
        GatehouseError::BadRequest(
            "This action can only be performed when a user is logged in.".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_json_shape() {
        let mut account = Account::new("abc");
        account
            .web_ids
            .insert("http://pod/me#i".into(), "http://srv/webid/1/".into());
        let json = serde_json::to_value(&account).unwrap();

        assert_eq!(json["id"], "abc");
        assert!(json["logins"].is_object());
        assert!(json["pods"].is_object());
        assert!(json["credentials"].is_object());
        assert_eq!(json["webIds"]["http://pod/me#i"], "http://srv/webid/1/");
    }

    #[test]
    fn test_lookups_by_url() {
        let mut account = Account::new("abc");
        account
            .pods
            .insert("http://srv/alice/".into(), "http://srv/.account/pod/alice/".into());
        account
            .credentials
            .insert("token_1".into(), "http://srv/.account/cred/token_1/".into());

        assert_eq!(
            account.owning_pod("http://srv/alice/profile/card"),
            Some("http://srv/alice/")
        );
        assert_eq!(account.owning_pod("http://srv/bob/"), None);
        assert_eq!(
            account.credential_for_url("http://srv/.account/cred/token_1/"),
            Some("token_1")
        );
        assert_eq!(account.web_id_for_url("http://srv/nothing/"), None);
    }
}
