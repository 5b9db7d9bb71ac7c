//! Multi-step registration
//!
//! One request can create an account, add a login method, create a pod and
//! link a WebID. Steps run in that fixed order. A failing step is reported
//! inline as `{ "error": message }` and stops the remaining steps; results
//! of earlier steps are kept.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::oidc::single_entry;
use super::{InteractionHandler, InteractionInput, JsonObject, JsonRepresentation, ResponseMetadata};
use crate::types::{GatehouseError, Result};

const SECTIONS: [&str; 4] = ["account", "login", "pod", "webId"];

/// Runs account, login, pod and WebID handlers from a single input
pub struct RegistrationHandler {
    account_handler: Arc<dyn InteractionHandler>,
    login_handler: Arc<dyn InteractionHandler>,
    pod_handler: Arc<dyn InteractionHandler>,
    web_id_handler: Arc<dyn InteractionHandler>,
}

impl RegistrationHandler {
    pub fn new(
        account_handler: Arc<dyn InteractionHandler>,
        login_handler: Arc<dyn InteractionHandler>,
        pod_handler: Arc<dyn InteractionHandler>,
        web_id_handler: Arc<dyn InteractionHandler>,
    ) -> Self {
        Self {
            account_handler,
            login_handler,
            pod_handler,
            web_id_handler,
        }
    }

    fn validate(json: &Value) -> Result<&JsonObject> {
        let object = json.as_object().ok_or_else(|| {
            GatehouseError::BadRequest("Registration input must be a JSON object.".to_string())
        })?;
        for section in SECTIONS {
            if let Some(value) = object.get(section) {
                if !value.is_object() {
                    return Err(GatehouseError::BadRequest(format!(
                        "{} must be an object.",
                        section
                    )));
                }
            }
        }
        Ok(object)
    }

    /// Run one optional step; returns false when processing has to stop
    async fn use_handler(
        key: &str,
        sections: &JsonObject,
        handler: &dyn InteractionHandler,
        input: &InteractionInput,
        json: &mut JsonObject,
        metadata: &mut ResponseMetadata,
    ) -> bool {
        let Some(section) = sections.get(key) else {
            return true;
        };

        let step_input = InteractionInput {
            json: section.clone(),
            ..input.clone()
        };
        match handler.handle_safe(&step_input).await {
            Ok(result) => {
                json.insert(key.to_string(), Value::Object(result.json));
                if let Some(step_metadata) = result.metadata {
                    metadata.merge(step_metadata);
                }
                true
            }
            Err(e) => {
                debug!("Registration step {} failed: {}", key, e);
                json.insert(
                    key.to_string(),
                    Value::Object(single_entry("error", Value::String(e.to_string()))),
                );
                false
            }
        }
    }
}

#[async_trait]
impl InteractionHandler for RegistrationHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let sections = Self::validate(&input.json)?;

        let mut json = JsonObject::new();
        let mut metadata = ResponseMetadata::default();
        let mut input = input.clone();

        if let Some(account) = sections.get("account") {
            let step_input = InteractionInput {
                json: account.clone(),
                ..input.clone()
            };
            let result = self.account_handler.handle_safe(&step_input).await?;
            if let Some(id) = result.json.get("accountId").and_then(Value::as_str) {
                input.account_id = Some(id.to_string());
            }
            json.insert("account".to_string(), Value::Object(result.json));
            if let Some(step_metadata) = result.metadata {
                metadata.merge(step_metadata);
            }
        }

        let steps: [(&str, &dyn InteractionHandler); 3] = [
            ("login", self.login_handler.as_ref()),
            ("pod", self.pod_handler.as_ref()),
            ("webId", self.web_id_handler.as_ref()),
        ];
        for (key, handler) in steps {
            if !Self::use_handler(key, sections, handler, &input, &mut json, &mut metadata).await {
                break;
            }
        }

        let representation = JsonRepresentation::new(json);
        Ok(if metadata.is_empty() {
            representation
        } else {
            representation.with_metadata(metadata)
        })
    }
}
