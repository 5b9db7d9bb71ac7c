use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::ClientCredentials;
use crate::account::AccountStore;
use crate::storage::KeyValueStorage;
use crate::types::Result;

/// Grant type of clients synthesized from credential tokens
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Client registration as the OIDC provider sees it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClientPayload {
    pub client_id: String,
    pub client_secret: String,
    pub grant_types: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub response_types: Vec<String>,
}

/// Client lookup used by the OIDC provider
#[async_trait]
pub trait ClientAdapter: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<ClientPayload>>;
}

/// Clients registered in process memory
#[derive(Default)]
pub struct MemoryClientAdapter {
    clients: DashMap<String, ClientPayload>,
}

impl MemoryClientAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: ClientPayload) {
        self.clients.insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientAdapter for MemoryClientAdapter {
    async fn find(&self, id: &str) -> Result<Option<ClientPayload>> {
        Ok(self.clients.get(id).map(|entry| entry.value().clone()))
    }
}

/// Falls back to credential tokens when the source knows no such client
///
/// Unlinking a WebID does not delete the tokens bound to it. Instead, every
/// lookup re-checks the binding; a stale token is deleted and reported as
/// absent.
pub struct ClientCredentialsAdapter {
    source: Arc<dyn ClientAdapter>,
    account_store: Arc<dyn AccountStore>,
    storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
}

impl ClientCredentialsAdapter {
    pub fn new(
        source: Arc<dyn ClientAdapter>,
        account_store: Arc<dyn AccountStore>,
        storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
    ) -> Self {
        Self {
            source,
            account_store,
            storage,
        }
    }
}

#[async_trait]
impl ClientAdapter for ClientCredentialsAdapter {
    async fn find(&self, id: &str) -> Result<Option<ClientPayload>> {
        if let Some(client) = self.source.find(id).await? {
            return Ok(Some(client));
        }

        let Some(credentials) = self.storage.get(id).await? else {
            return Ok(None);
        };

        let still_linked = self
            .account_store
            .find(&credentials.account_id)
            .await?
            .is_some_and(|account| account.web_ids.contains_key(&credentials.web_id));
        if !still_linked {
            info!(
                "Deleting credential token {}: {} is no longer linked",
                id, credentials.web_id
            );
            self.storage.delete(id).await?;
            return Ok(None);
        }

        debug!("Using credential token {} for {}", id, credentials.web_id);
        Ok(Some(ClientPayload {
            client_id: id.to_string(),
            client_secret: credentials.secret,
            grant_types: vec![CLIENT_CREDENTIALS_GRANT.to_string()],
            redirect_uris: Vec::new(),
            response_types: Vec::new(),
        }))
    }
}
