use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use super::oidc::{finish_interaction, single_entry};
use super::routing::{route_params, InteractionRoute, ACCOUNT_ID};
use super::{InteractionHandler, InteractionInput, JsonRepresentation};
use crate::account::AccountStore;
use crate::types::{GatehouseError, Result};

/// Turns a successful login into a session
///
/// Wraps a login handler that outputs `accountId`. Adds the account URL,
/// finishes an active OIDC interaction (returning its continue location as
/// `location` in the JSON instead of redirecting, so the cookie can still be
/// set) and mints a session cookie.
pub struct ResolveLoginHandler {
    login_handler: Arc<dyn InteractionHandler>,
    account_store: Arc<dyn AccountStore>,
    account_route: Arc<dyn InteractionRoute>,
}

impl ResolveLoginHandler {
    pub fn new(
        login_handler: Arc<dyn InteractionHandler>,
        account_store: Arc<dyn AccountStore>,
        account_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            login_handler,
            account_store,
            account_route,
        }
    }
}

#[async_trait]
impl InteractionHandler for ResolveLoginHandler {
    async fn can_handle(&self, input: &InteractionInput) -> Result<()> {
        self.login_handler.can_handle(input).await
    }

    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let result = self.login_handler.handle(input).await?;
        let Some(account_id) = result
            .json
            .get("accountId")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Ok(result);
        };

        if self.account_store.find(&account_id).await?.is_none() {
            error!(
                "Authenticated user with ID {} but could not find a matching account",
                account_id
            );
            return Err(GatehouseError::Internal(
                "Could not find a matching account.".to_string(),
            ));
        }

        let path = self
            .account_route
            .get_path(&route_params([(ACCOUNT_ID, account_id.as_str())]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate account URL".into()))?;

        let mut json = result.json;
        json.insert("account".to_string(), Value::String(path.clone()));

        if let Some(ref interaction) = input.oidc_interaction {
            let location = finish_interaction(
                interaction.as_ref(),
                single_entry("account", Value::String(account_id.clone())),
                true,
            )
            .await?;
            json.insert("location".to_string(), Value::String(location));
        }

        let cookie = self.account_store.generate_cookie(&account_id).await?;
        let mut metadata = result.metadata.unwrap_or_default();
        metadata.account_cookie = Some(cookie);
        metadata.location = Some(path);

        Ok(JsonRepresentation::new(json).with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{BaseAccountStore, DEFAULT_COOKIE_TTL_MINUTES};
    use crate::interaction::oidc::testing::RecordingInteraction;
    use crate::interaction::routing::{AbsolutePathRoute, IdRoute};
    use crate::interaction::StaticJsonHandler;
    use hyper::Method;
    use serde_json::json;

    fn setup(login_output: Value) -> (Arc<dyn AccountStore>, ResolveLoginHandler) {
        let store: Arc<dyn AccountStore> =
            Arc::new(BaseAccountStore::in_memory(DEFAULT_COOKIE_TTL_MINUTES));
        let base: Arc<dyn InteractionRoute> =
            Arc::new(AbsolutePathRoute::new("http://srv/.account/account/"));
        let handler = ResolveLoginHandler::new(
            Arc::new(StaticJsonHandler::new(login_output)),
            store.clone(),
            Arc::new(IdRoute::new(base, ACCOUNT_ID)),
        );
        (store, handler)
    }

    async fn existing_account(store: &Arc<dyn AccountStore>) -> String {
        store.create().await.unwrap().id
    }

    #[tokio::test]
    async fn test_passthrough_without_account_id() {
        let (_, handler) = setup(json!({ "other": 1 }));
        let input = InteractionInput::new(Method::POST, "http://srv/login/");
        let result = handler.handle_safe(&input).await.unwrap();
        assert_eq!(result.json["other"], 1);
        assert!(result.metadata.is_none());
    }

    #[tokio::test]
    async fn test_unknown_account_is_internal_error() {
        let (_, handler) = setup(json!({ "accountId": "ghost" }));
        let input = InteractionInput::new(Method::POST, "http://srv/login/");
        let err = handler.handle_safe(&input).await.unwrap_err();
        assert!(matches!(err, GatehouseError::Internal(_)));
    }

    #[tokio::test]
    async fn test_login_mints_cookie() {
        let store: Arc<dyn AccountStore> =
            Arc::new(BaseAccountStore::in_memory(DEFAULT_COOKIE_TTL_MINUTES));
        let id = existing_account(&store).await;
        let base: Arc<dyn InteractionRoute> =
            Arc::new(AbsolutePathRoute::new("http://srv/.account/account/"));
        let handler = ResolveLoginHandler::new(
            Arc::new(StaticJsonHandler::new(json!({ "accountId": id }))),
            store.clone(),
            Arc::new(IdRoute::new(base, ACCOUNT_ID)),
        );

        let input = InteractionInput::new(Method::POST, "http://srv/login/");
        let result = handler.handle_safe(&input).await.unwrap();

        let path = format!("http://srv/.account/account/{}/", id);
        assert_eq!(result.json["account"], path.as_str());
        assert!(!result.json.contains_key("location"));

        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.location.as_deref(), Some(path.as_str()));
        let cookie = metadata.account_cookie.unwrap();
        assert_eq!(store.find_by_cookie(&cookie).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_login_finishes_oidc_interaction() {
        let store: Arc<dyn AccountStore> =
            Arc::new(BaseAccountStore::in_memory(DEFAULT_COOKIE_TTL_MINUTES));
        let id = existing_account(&store).await;
        let base: Arc<dyn InteractionRoute> =
            Arc::new(AbsolutePathRoute::new("http://srv/.account/account/"));
        let handler = ResolveLoginHandler::new(
            Arc::new(StaticJsonHandler::new(json!({ "accountId": id }))),
            store,
            Arc::new(IdRoute::new(base, ACCOUNT_ID)),
        );

        let interaction = Arc::new(RecordingInteraction::new("login"));
        let input = InteractionInput::new(Method::POST, "http://srv/login/")
            .with_oidc(interaction.clone());
        let result = handler.handle_safe(&input).await.unwrap();

        assert_eq!(result.json["location"], "http://idp/return");
        assert_eq!(interaction.saved_result().unwrap()["account"], id.as_str());
        assert!(result.metadata.unwrap().account_cookie.is_some());
    }
}
