//! WebID linking, unlinking and selection

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::oidc::{assert_oidc_interaction, finish_interaction, single_entry};
use super::pod::web_id_hash;
use super::routing::{route_params, InteractionRoute, RouteParams, ACCOUNT_ID, WEB_ID_HASH};
use super::{parse_input, required_field, InteractionHandler, InteractionInput, JsonObject, JsonRepresentation};
use crate::account::{get_required_account, AccountStore};
use crate::types::{GatehouseError, Result};

/// Proves that the requester controls a WebID
#[async_trait]
pub trait OwnershipValidator: Send + Sync {
    async fn validate(&self, web_id: &str) -> Result<()>;
}

/// Accepts or rejects every WebID outside the requester's pods
pub struct StaticOwnershipValidator {
    allow: bool,
}

impl StaticOwnershipValidator {
    pub fn new(allow: bool) -> Self {
        Self { allow }
    }
}

#[async_trait]
impl OwnershipValidator for StaticOwnershipValidator {
    async fn validate(&self, web_id: &str) -> Result<()> {
        if self.allow {
            Ok(())
        } else {
            Err(GatehouseError::BadRequest(format!(
                "Unable to verify ownership of {}.",
                web_id
            )))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebIdInput {
    web_id: String,
}

/// Links a WebID to the logged-in account
///
/// WebIDs inside one of the account's own pods are linked directly; any
/// other WebID goes through the `OwnershipValidator` first.
pub struct WebIdLinker {
    base_url: String,
    ownership_validator: Arc<dyn OwnershipValidator>,
    account_store: Arc<dyn AccountStore>,
    web_id_route: Arc<dyn InteractionRoute>,
}

impl WebIdLinker {
    pub fn new(
        base_url: &str,
        ownership_validator: Arc<dyn OwnershipValidator>,
        account_store: Arc<dyn AccountStore>,
        web_id_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            ownership_validator,
            account_store,
            web_id_route,
        }
    }
}

#[async_trait]
impl InteractionHandler for WebIdLinker {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;
        let WebIdInput { web_id } = parse_input(&input.json)?;
        let web_id = required_field(&web_id, "webId")?;

        let document = web_id.split('#').next().unwrap_or(&web_id);
        if account.owning_pod(document).is_none() {
            self.ownership_validator.validate(&web_id).await?;
        } else {
            debug!("{} lies in a pod of account {}", web_id, account.id);
        }

        let hash = web_id_hash(&web_id);
        let path = self
            .web_id_route
            .get_path(&route_params([(ACCOUNT_ID, account.id.as_str()), (WEB_ID_HASH, hash.as_str())]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate WebID URL".into()))?;
        account.web_ids.insert(web_id, path.clone());
        self.account_store.update(&account).await?;

        let mut json = JsonObject::new();
        json.insert("url".to_string(), Value::String(path));
        json.insert("oidcIssuer".to_string(), Value::String(self.base_url.clone()));
        Ok(JsonRepresentation::new(json))
    }
}

/// Removes the WebID link identified by the request target
pub struct WebIdUnlinker {
    account_store: Arc<dyn AccountStore>,
}

impl WebIdUnlinker {
    pub fn new(account_store: Arc<dyn AccountStore>) -> Self {
        Self { account_store }
    }
}

#[async_trait]
impl InteractionHandler for WebIdUnlinker {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;

        let web_id = account
            .web_id_for_url(&input.target)
            .map(str::to_string)
            .ok_or_else(|| GatehouseError::NotFound("Could not find matching WebID.".to_string()))?;

        account.web_ids.remove(&web_id);
        self.account_store.update(&account).await?;
        Ok(JsonRepresentation::empty())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PickWebIdInput {
    web_id: String,
    #[serde(default)]
    remember: bool,
}

/// Completes an OIDC login as one of the account's WebIDs
///
/// Answers with a redirect to the provider's continue location.
pub struct WebIdPicker {
    account_store: Arc<dyn AccountStore>,
}

impl WebIdPicker {
    pub fn new(account_store: Arc<dyn AccountStore>) -> Self {
        Self { account_store }
    }
}

#[async_trait]
impl InteractionHandler for WebIdPicker {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let interaction = assert_oidc_interaction(&input.oidc_interaction)?;
        let account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;

        let PickWebIdInput { web_id, remember } = parse_input(&input.json)?;
        let web_id = web_id.trim();
        if !account.web_ids.contains_key(web_id) {
            return Err(GatehouseError::BadRequest(
                "WebID does not belong to this account.".to_string(),
            ));
        }

        // The provider calls the authenticated subject "accountId"
        let login = json!({ "accountId": web_id, "remember": remember });
        let location = finish_interaction(interaction.as_ref(), single_entry("login", login), true).await?;
        Err(GatehouseError::Found { location })
    }
}

/// Redirects to the route that answers the active interaction's prompt
pub struct PromptHandler {
    prompt_routes: Vec<(String, Arc<dyn InteractionRoute>)>,
}

impl PromptHandler {
    pub fn new(prompt_routes: Vec<(&str, Arc<dyn InteractionRoute>)>) -> Self {
        Self {
            prompt_routes: prompt_routes
                .into_iter()
                .map(|(prompt, route)| (prompt.to_string(), route))
                .collect(),
        }
    }
}

#[async_trait]
impl InteractionHandler for PromptHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let prompt = input
            .oidc_interaction
            .as_ref()
            .map(|interaction| interaction.prompt().to_string());

        let location = prompt.as_deref().and_then(|prompt| {
            self.prompt_routes
                .iter()
                .find(|(name, _)| name == prompt)
                .and_then(|(_, route)| route.get_path(&RouteParams::new()))
        });

        match location {
            Some(location) => Err(GatehouseError::Found { location }),
            None => Err(GatehouseError::BadRequest(format!(
                "Unsupported prompt: {}",
                prompt.unwrap_or_default()
            ))),
        }
    }
}
