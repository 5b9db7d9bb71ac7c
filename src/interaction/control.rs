//! Discovery controls
//!
//! `ControlHandler` decorates the output of its source with a map of related
//! URLs so clients can navigate the account API without hard-coding paths.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::routing::{InteractionRoute, RouteParams, ACCOUNT_ID};
use super::{InteractionHandler, InteractionInput, JsonObject, JsonRepresentation};
use crate::types::Result;

/// Version marker added to every discovery response
pub const API_VERSION: &str = "0.4";

/// Adds the output of named control handlers under `key`, plus `apiVersion`
pub struct ControlHandler {
    source: Arc<dyn InteractionHandler>,
    key: String,
    controls: Vec<(String, Arc<dyn InteractionHandler>)>,
}

impl ControlHandler {
    pub fn new(
        source: Arc<dyn InteractionHandler>,
        key: &str,
        controls: Vec<(String, Arc<dyn InteractionHandler>)>,
    ) -> Self {
        Self {
            source,
            key: key.to_string(),
            controls,
        }
    }
}

#[async_trait]
impl InteractionHandler for ControlHandler {
    async fn can_handle(&self, input: &InteractionInput) -> Result<()> {
        self.source.can_handle(input).await
    }

    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let result = self.source.handle(input).await?;

        let mut controls = JsonObject::new();
        for (name, handler) in &self.controls {
            let control = handler.handle_safe(input).await?;
            controls.insert(name.clone(), Value::Object(control.json));
        }

        let mut json = result.json;
        json.insert(self.key.clone(), Value::Object(controls));
        json.insert("apiVersion".to_string(), Value::String(API_VERSION.to_string()));

        Ok(JsonRepresentation {
            json,
            metadata: result.metadata,
        })
    }
}

/// Outputs the paths of routes that need no parameters
pub struct StaticControlHandler {
    controls: JsonObject,
}

impl StaticControlHandler {
    /// Routes that cannot be generated without parameters are skipped
    pub fn new(routes: Vec<(&str, Arc<dyn InteractionRoute>)>) -> Self {
        let params = RouteParams::new();
        let controls = routes
            .into_iter()
            .filter_map(|(name, route)| {
                route
                    .get_path(&params)
                    .map(|path| (name.to_string(), Value::String(path)))
            })
            .collect();
        Self { controls }
    }
}

#[async_trait]
impl InteractionHandler for StaticControlHandler {
    async fn handle(&self, _input: &InteractionInput) -> Result<JsonRepresentation> {
        Ok(JsonRepresentation::new(self.controls.clone()))
    }
}

/// Outputs route paths generated for the logged-in account
///
/// Anonymous requests get an empty object.
pub struct AccountControlHandler {
    controls: Vec<(String, Arc<dyn InteractionRoute>)>,
}

impl AccountControlHandler {
    pub fn new(controls: Vec<(&str, Arc<dyn InteractionRoute>)>) -> Self {
        Self {
            controls: controls
                .into_iter()
                .map(|(name, route)| (name.to_string(), route))
                .collect(),
        }
    }
}

#[async_trait]
impl InteractionHandler for AccountControlHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut params = RouteParams::new();
        if let Some(ref account_id) = input.account_id {
            params.insert(ACCOUNT_ID.to_string(), account_id.clone());
        }

        let json = self
            .controls
            .iter()
            .filter_map(|(name, route)| {
                route
                    .get_path(&params)
                    .map(|path| (name.clone(), Value::String(path)))
            })
            .collect();
        Ok(JsonRepresentation::new(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::routing::{AbsolutePathRoute, IdRoute, RelativePathRoute};
    use crate::interaction::{ResponseMetadata, StaticJsonHandler};
    use hyper::Method;
    use serde_json::json;

    struct CookieHandler;

    #[async_trait]
    impl InteractionHandler for CookieHandler {
        async fn handle(&self, _input: &InteractionInput) -> Result<JsonRepresentation> {
            let json = json!({ "source": true });
            Ok(JsonRepresentation::new(json.as_object().cloned().unwrap_or_default())
                .with_metadata(ResponseMetadata {
                    account_cookie: Some("cookie".into()),
                    location: None,
                }))
        }
    }

    fn routes() -> (Arc<dyn InteractionRoute>, Arc<dyn InteractionRoute>) {
        let base: Arc<dyn InteractionRoute> = Arc::new(AbsolutePathRoute::new("http://srv/.account/"));
        let accounts: Arc<dyn InteractionRoute> =
            Arc::new(RelativePathRoute::new(base.clone(), "account/"));
        let account: Arc<dyn InteractionRoute> = Arc::new(IdRoute::new(accounts, ACCOUNT_ID));
        (base, account)
    }

    #[tokio::test]
    async fn test_controls_are_nested_under_key() {
        let (base, account) = routes();
        let handler = ControlHandler::new(
            Arc::new(CookieHandler),
            "controls",
            vec![
                (
                    "main".to_string(),
                    Arc::new(StaticControlHandler::new(vec![("index", base)]))
                        as Arc<dyn InteractionHandler>,
                ),
                (
                    "account".to_string(),
                    Arc::new(AccountControlHandler::new(vec![("account", account)]))
                        as Arc<dyn InteractionHandler>,
                ),
            ],
        );

        let input = InteractionInput::new(Method::GET, "http://srv/.account/").with_account("abc");
        let result = handler.handle_safe(&input).await.unwrap();

        assert_eq!(
            Value::Object(result.json),
            json!({
                "source": true,
                "controls": {
                    "main": { "index": "http://srv/.account/" },
                    "account": { "account": "http://srv/.account/account/abc/" }
                },
                "apiVersion": "0.4"
            })
        );
        assert_eq!(
            result.metadata.and_then(|m| m.account_cookie).as_deref(),
            Some("cookie")
        );
    }

    #[tokio::test]
    async fn test_account_controls_skip_without_session() {
        let (_, account) = routes();
        let handler = AccountControlHandler::new(vec![("account", account)]);
        let input = InteractionInput::new(Method::GET, "http://srv/.account/");
        assert!(handler.handle(&input).await.unwrap().json.is_empty());
    }

    #[tokio::test]
    async fn test_source_output_is_kept() {
        let handler = ControlHandler::new(
            Arc::new(StaticJsonHandler::new(json!({ "id": "abc" }))),
            "controls",
            Vec::new(),
        );
        let input = InteractionInput::new(Method::GET, "http://srv/.account/");
        let result = handler.handle_safe(&input).await.unwrap();
        assert_eq!(result.json["id"], "abc");
        assert_eq!(result.json["controls"], json!({}));
        assert_eq!(result.json["apiVersion"], API_VERSION);
    }
}
