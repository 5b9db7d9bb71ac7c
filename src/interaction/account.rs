//! Account lifecycle handlers: create, view, log out

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::routing::{route_params, InteractionRoute, ACCOUNT_ID};
use super::{InteractionHandler, InteractionInput, JsonObject, JsonRepresentation, ResponseMetadata};
use crate::account::{get_required_account, AccountStore};
use crate::types::{GatehouseError, Result};

/// Creates a new account and logs the caller in as that account
pub struct CreateAccountHandler {
    account_store: Arc<dyn AccountStore>,
    account_route: Arc<dyn InteractionRoute>,
}

impl CreateAccountHandler {
    pub fn new(account_store: Arc<dyn AccountStore>, account_route: Arc<dyn InteractionRoute>) -> Self {
        Self {
            account_store,
            account_route,
        }
    }
}

#[async_trait]
impl InteractionHandler for CreateAccountHandler {
    async fn handle(&self, _input: &InteractionInput) -> Result<JsonRepresentation> {
        let account = self.account_store.create().await?;
        let path = self
            .account_route
            .get_path(&route_params([(ACCOUNT_ID, account.id.as_str())]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate account URL".into()))?;

        let cookie = self.account_store.generate_cookie(&account.id).await?;

        let mut json = JsonObject::new();
        json.insert("account".to_string(), Value::String(path.clone()));
        json.insert("accountId".to_string(), Value::String(account.id));

        Ok(JsonRepresentation::new(json).with_metadata(ResponseMetadata {
            account_cookie: Some(cookie),
            location: Some(path),
        }))
    }
}

/// Returns the account document of the logged-in user
pub struct AccountViewHandler {
    account_store: Arc<dyn AccountStore>,
}

impl AccountViewHandler {
    pub fn new(account_store: Arc<dyn AccountStore>) -> Self {
        Self { account_store }
    }
}

#[async_trait]
impl InteractionHandler for AccountViewHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;
        match serde_json::to_value(account)? {
            Value::Object(json) => Ok(JsonRepresentation::new(json)),
            _ => Err(GatehouseError::Internal("Account did not serialize to an object".into())),
        }
    }
}

/// Invalidates the session cookie of the request
pub struct LogoutHandler {
    account_store: Arc<dyn AccountStore>,
}

impl LogoutHandler {
    pub fn new(account_store: Arc<dyn AccountStore>) -> Self {
        Self { account_store }
    }
}

#[async_trait]
impl InteractionHandler for LogoutHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        if let Some(ref cookie) = input.metadata.account_cookie {
            // The cookie has to belong to the account the request acts on
            let found = self.account_store.find_by_cookie(cookie).await?;
            if found.is_none() || found != input.account_id {
                return Err(GatehouseError::BadRequest("Invalid cookie.".to_string()));
            }
            self.account_store.delete_cookie(cookie).await?;
            debug!("Logged out account {:?}", input.account_id);
        }
        Ok(JsonRepresentation::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{BaseAccountStore, DEFAULT_COOKIE_TTL_MINUTES};
    use crate::interaction::routing::{AbsolutePathRoute, IdRoute};
    use hyper::Method;

    fn setup() -> (Arc<dyn AccountStore>, Arc<dyn InteractionRoute>) {
        let store: Arc<dyn AccountStore> =
            Arc::new(BaseAccountStore::in_memory(DEFAULT_COOKIE_TTL_MINUTES));
        let base: Arc<dyn InteractionRoute> =
            Arc::new(AbsolutePathRoute::new("http://srv/.account/account/"));
        (store, Arc::new(IdRoute::new(base, ACCOUNT_ID)))
    }

    #[tokio::test]
    async fn test_create_logs_in_new_account() {
        let (store, route) = setup();
        let handler = CreateAccountHandler::new(store.clone(), route);
        let input = InteractionInput::new(Method::POST, "http://srv/.account/account/");

        let result = handler.handle_safe(&input).await.unwrap();
        let id = result.json["accountId"].as_str().unwrap().to_string();
        let path = format!("http://srv/.account/account/{}/", id);
        assert_eq!(result.json["account"], path.as_str());

        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.location.as_deref(), Some(path.as_str()));
        let cookie = metadata.account_cookie.unwrap();
        assert_eq!(store.find_by_cookie(&cookie).await.unwrap(), Some(id.clone()));
        assert!(store.find(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_view_requires_login() {
        let (store, _) = setup();
        let handler = AccountViewHandler::new(store.clone());
        let input = InteractionInput::new(Method::GET, "http://srv/");
        assert!(matches!(
            handler.handle(&input).await.unwrap_err(),
            GatehouseError::BadRequest(_)
        ));

        let account = store.create().await.unwrap();
        let result = handler.handle(&input.with_account(account.id.clone())).await.unwrap();
        assert_eq!(result.json["id"], account.id.as_str());
        assert!(result.json["webIds"].is_object());
    }

    #[tokio::test]
    async fn test_logout_deletes_matching_cookie() {
        let (store, _) = setup();
        let handler = LogoutHandler::new(store.clone());
        let cookie = store.generate_cookie("abc").await.unwrap();

        let input = InteractionInput::new(Method::POST, "http://srv/")
            .with_account("abc")
            .with_cookie(cookie.clone());
        handler.handle(&input).await.unwrap();

        assert_eq!(store.find_by_cookie(&cookie).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_rejects_foreign_cookie() {
        let (store, _) = setup();
        let handler = LogoutHandler::new(store.clone());
        let cookie = store.generate_cookie("abc").await.unwrap();

        let input = InteractionInput::new(Method::POST, "http://srv/")
            .with_account("xyz")
            .with_cookie(cookie.clone());
        assert!(matches!(
            handler.handle(&input).await.unwrap_err(),
            GatehouseError::BadRequest(_)
        ));
        assert!(store.find_by_cookie(&cookie).await.unwrap().is_some());
    }
}
