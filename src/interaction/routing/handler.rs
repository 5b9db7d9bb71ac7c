use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use super::{InteractionRoute, ACCOUNT_ID};
use crate::interaction::{InteractionHandler, InteractionInput, JsonRepresentation};
use crate::types::{GatehouseError, Result};

/// Only accepts input whose target matches the route
///
/// When the route binds an account id, it must equal the account of the
/// logged-in user, so guessing another account's URL gets a 404.
pub struct RouteHandler {
    route: Arc<dyn InteractionRoute>,
    source: Arc<dyn InteractionHandler>,
}

impl RouteHandler {
    pub fn new(route: Arc<dyn InteractionRoute>, source: Arc<dyn InteractionHandler>) -> Self {
        Self { route, source }
    }
}

#[async_trait]
impl InteractionHandler for RouteHandler {
    async fn can_handle(&self, input: &InteractionInput) -> Result<()> {
        let params = self
            .route
            .match_path(&input.target)
            .ok_or_else(|| GatehouseError::NotFound(format!("{} not found", input.target)))?;

        if let Some(account_id) = params.get(ACCOUNT_ID) {
            if input.account_id.as_deref() != Some(account_id.as_str()) {
                trace!("Route account {} does not match session", account_id);
                return Err(GatehouseError::NotFound(format!(
                    "{} not found",
                    input.target
                )));
            }
        }

        self.source.can_handle(input).await
    }

    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        self.source.handle(input).await
    }
}
