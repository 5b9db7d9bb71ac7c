//! Pod creation
//!
//! Pod provisioning itself belongs to the storage engine; this module only
//! decides the pod URL, asks the `PodManager` to create it and records the
//! pod and its generated WebID on the account.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use super::routing::{ensure_trailing_slash, join_url, route_params, InteractionRoute, ACCOUNT_ID, POD_ID, WEB_ID_HASH};
use super::{parse_input, sanitize_url_part, InteractionHandler, InteractionInput, JsonObject, JsonRepresentation};
use crate::account::{get_required_account, AccountStore};
use crate::types::{GatehouseError, Result};

/// Default location of the WebID inside a new pod
pub const DEFAULT_WEB_ID_SUFFIX: &str = "profile/card#me";

/// Settings handed to the pod manager
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSettings {
    pub base: String,
    pub web_id: String,
    pub oidc_issuer: String,
    /// Any further settings supplied by the client
    #[serde(flatten)]
    pub extra: JsonObject,
}

/// Creates the storage for a pod
#[async_trait]
pub trait PodManager: Send + Sync {
    /// `overwrite` is set for the server root pod, which may already exist
    async fn create_pod(&self, base: &str, settings: &PodSettings, overwrite: bool) -> Result<()>;
}

/// Pod manager that only remembers which pods exist
#[derive(Default)]
pub struct InMemoryPodManager {
    pods: DashMap<String, PodSettings>,
}

impl InMemoryPodManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, base: &str) -> Option<PodSettings> {
        self.pods.get(base).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

#[async_trait]
impl PodManager for InMemoryPodManager {
    async fn create_pod(&self, base: &str, settings: &PodSettings, overwrite: bool) -> Result<()> {
        if !overwrite && self.pods.contains_key(base) {
            return Err(GatehouseError::Conflict(format!(
                "There already is a resource at {}",
                base
            )));
        }
        self.pods.insert(base.to_string(), settings.clone());
        info!("Created pod at {}", base);
        Ok(())
    }
}

/// Turns a pod name into a pod base URL
pub trait IdentifierGenerator: Send + Sync {
    fn generate(&self, name: &str) -> String;
}

/// Appends the sanitized name to a base URL: `<base>/<name>/`
pub struct SuffixIdentifierGenerator {
    base: String,
}

impl SuffixIdentifierGenerator {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
        }
    }
}

impl IdentifierGenerator for SuffixIdentifierGenerator {
    fn generate(&self, name: &str) -> String {
        ensure_trailing_slash(&join_url(&self.base, &sanitize_url_part(name)))
    }
}

/// Hex SHA-256 of a WebID, used as its URL segment
pub fn web_id_hash(web_id: &str) -> String {
    hex::encode(Sha256::digest(web_id.as_bytes()))
}

#[derive(Deserialize)]
struct CreatePodInput {
    name: Option<String>,
    #[serde(default)]
    settings: JsonObject,
}

/// Wiring for `CreatePodHandler`
pub struct CreatePodArgs {
    pub pod_manager: Arc<dyn PodManager>,
    pub identifier_generator: Arc<dyn IdentifierGenerator>,
    pub web_id_suffix: String,
    pub account_store: Arc<dyn AccountStore>,
    pub pod_route: Arc<dyn InteractionRoute>,
    pub web_id_route: Arc<dyn InteractionRoute>,
    /// Server base URL; also the root pod location and OIDC issuer
    pub base_url: String,
    pub allow_root: bool,
}

/// Creates a pod for the logged-in account and links its generated WebID
///
/// The pod is provisioned before the account is updated: if the update
/// fails, the pod exists without being recorded on any account.
pub struct CreatePodHandler {
    args: CreatePodArgs,
}

impl CreatePodHandler {
    pub fn new(args: CreatePodArgs) -> Self {
        Self { args }
    }

    fn pod_name(&self, name: Option<String>) -> Result<Option<String>> {
        match name.map(|n| n.trim().to_string()) {
            Some(name) if name.is_empty() => Err(GatehouseError::BadRequest(
                "Pod name can not be empty.".to_string(),
            )),
            Some(name) => Ok(Some(name)),
            None if self.args.allow_root => Ok(None),
            None => Err(GatehouseError::BadRequest(
                "A pod name is required.".to_string(),
            )),
        }
    }
}

#[async_trait]
impl InteractionHandler for CreatePodHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.args.account_store.as_ref(), input.account_id.as_deref())
                .await?;

        let CreatePodInput { name, mut settings } = parse_input(&input.json)?;
        let name = self.pod_name(name)?;

        let base = match name {
            Some(ref name) => self.args.identifier_generator.generate(name),
            None => ensure_trailing_slash(&self.args.base_url),
        };

        let generated_web_id = join_url(&base, &self.args.web_id_suffix);
        let web_id = match settings.remove("webId") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::String(_)) | None => generated_web_id.clone(),
            Some(_) => {
                return Err(GatehouseError::BadRequest(
                    "settings.webId must be a string.".to_string(),
                ))
            }
        };

        let pod_settings = PodSettings {
            base: base.clone(),
            web_id: web_id.clone(),
            oidc_issuer: self.args.base_url.clone(),
            extra: settings,
        };
        self.args
            .pod_manager
            .create_pod(&base, &pod_settings, name.is_none())
            .await?;

        let pod_id = urlencoding::encode(name.as_deref().unwrap_or("root")).into_owned();
        let pod_path = self
            .args
            .pod_route
            .get_path(&route_params([(ACCOUNT_ID, account.id.as_str()), (POD_ID, pod_id.as_str())]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate pod URL".into()))?;
        account.pods.insert(base.clone(), pod_path);

        // The generated WebID is linked even when a custom one was requested
        let hash = web_id_hash(&generated_web_id);
        let web_id_path = self
            .args
            .web_id_route
            .get_path(&route_params([(ACCOUNT_ID, account.id.as_str()), (WEB_ID_HASH, hash.as_str())]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate WebID URL".into()))?;
        account.web_ids.insert(generated_web_id, web_id_path);

        self.args.account_store.update(&account).await?;

        let mut json = JsonObject::new();
        json.insert("baseUrl".to_string(), Value::String(base));
        json.insert("webId".to_string(), Value::String(web_id));
        Ok(JsonRepresentation::new(json))
    }
}
