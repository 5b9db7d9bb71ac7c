//! Credential token issuance and revocation

use async_trait::async_trait;
use rand::RngCore;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::routing::{route_params, InteractionRoute, ACCOUNT_ID, CREDENTIALS_ID};
use super::{parse_input, required_field, sanitize_url_part, InteractionHandler, InteractionInput, JsonObject, JsonRepresentation};
use crate::account::{get_required_account, AccountStore};
use crate::credentials::ClientCredentials;
use crate::storage::KeyValueStorage;
use crate::types::{GatehouseError, Result};

/// Random bytes in a token secret
const SECRET_BYTES: usize = 64;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCredentialsInput {
    name: Option<String>,
    web_id: String,
}

/// Issues a credential token for one of the account's WebIDs
pub struct CreateCredentialsHandler {
    account_store: Arc<dyn AccountStore>,
    credentials_storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
    credentials_route: Arc<dyn InteractionRoute>,
}

impl CreateCredentialsHandler {
    pub fn new(
        account_store: Arc<dyn AccountStore>,
        credentials_storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
        credentials_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            account_store,
            credentials_storage,
            credentials_route,
        }
    }

    fn token_id(name: Option<&str>) -> String {
        let uuid = Uuid::new_v4();
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => format!("{}_{}", sanitize_url_part(name), uuid),
            None => uuid.to_string(),
        }
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl InteractionHandler for CreateCredentialsHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;
        let CreateCredentialsInput { name, web_id } = parse_input(&input.json)?;
        let web_id = required_field(&web_id, "webId")?;

        if !account.web_ids.contains_key(&web_id) {
            return Err(GatehouseError::BadRequest(
                "WebID does not belong to this account.".to_string(),
            ));
        }

        let id = Self::token_id(name.as_deref());
        let secret = generate_secret();
        let path = self
            .credentials_route
            .get_path(&route_params([(ACCOUNT_ID, account.id.as_str()), (CREDENTIALS_ID, id.as_str())]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate credentials URL".into()))?;

        // A token without an account reference is harmless, the reverse is not
        self.credentials_storage
            .set(
                &id,
                ClientCredentials {
                    account_id: account.id.clone(),
                    secret: secret.clone(),
                    web_id: web_id.clone(),
                },
            )
            .await?;
        account.credentials.insert(id.clone(), path.clone());
        self.account_store.update(&account).await?;
        info!("Issued credential token {} for {}", id, web_id);

        let mut json = JsonObject::new();
        json.insert("id".to_string(), Value::String(id));
        json.insert("secret".to_string(), Value::String(secret));
        json.insert("url".to_string(), Value::String(path));
        Ok(JsonRepresentation::new(json))
    }
}

/// Revokes the credential token identified by the request target
pub struct DeleteCredentialsHandler {
    account_store: Arc<dyn AccountStore>,
    credentials_storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
}

impl DeleteCredentialsHandler {
    pub fn new(
        account_store: Arc<dyn AccountStore>,
        credentials_storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
    ) -> Self {
        Self {
            account_store,
            credentials_storage,
        }
    }
}

#[async_trait]
impl InteractionHandler for DeleteCredentialsHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;

        let id = account
            .credential_for_url(&input.target)
            .map(str::to_string)
            .ok_or_else(|| {
                GatehouseError::NotFound("Could not find matching credential token.".to_string())
            })?;

        account.credentials.remove(&id);
        self.account_store.update(&account).await?;
        self.credentials_storage.delete(&id).await?;
        info!("Revoked credential token {}", id);
        Ok(JsonRepresentation::empty())
    }
}
