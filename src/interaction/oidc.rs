//! Contract with the external OIDC provider
//!
//! The provider owns the authentication negotiation. Handlers only need to
//! look at the active interaction and store a result on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyper::http::request::Parts;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::JsonObject;
use crate::types::{GatehouseError, Result};

/// An ongoing OIDC interaction
#[async_trait]
pub trait OidcInteraction: Send + Sync {
    /// Name of the prompt the provider wants answered, e.g. `login`
    fn prompt(&self) -> &str;

    /// Where the client continues once the interaction has a result
    fn return_to(&self) -> &str;

    /// Result stored by a previous step of this interaction
    fn last_submission(&self) -> Option<JsonObject>;

    fn expires_at(&self) -> DateTime<Utc>;

    /// Persist the interaction result for `ttl`
    async fn save_result(&self, result: JsonObject, ttl: Duration) -> Result<()>;
}

/// Looks up the active interaction of a request
#[async_trait]
pub trait InteractionProvider: Send + Sync {
    async fn interaction_details(
        &self,
        request: &Parts,
    ) -> Result<Option<Arc<dyn OidcInteraction>>>;
}

/// Provider for deployments without an OIDC engine: no request has an interaction
#[derive(Default)]
pub struct DisabledInteractionProvider;

#[async_trait]
impl InteractionProvider for DisabledInteractionProvider {
    async fn interaction_details(
        &self,
        _request: &Parts,
    ) -> Result<Option<Arc<dyn OidcInteraction>>> {
        Ok(None)
    }
}

/// Store `result` on the interaction and return the location to continue at
///
/// With `merge_with_previous` the result is layered over the last
/// submission. The interaction is saved for its remaining lifetime.
pub async fn finish_interaction(
    interaction: &dyn OidcInteraction,
    result: JsonObject,
    merge_with_previous: bool,
) -> Result<String> {
    let mut merged = if merge_with_previous {
        interaction.last_submission().unwrap_or_default()
    } else {
        JsonObject::new()
    };
    merged.extend(result);

    let remaining = (interaction.expires_at() - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    interaction.save_result(merged, remaining).await?;

    Ok(interaction.return_to().to_string())
}

/// Fail unless the request is part of an OIDC flow
pub fn assert_oidc_interaction(
    interaction: &Option<Arc<dyn OidcInteraction>>,
) -> Result<&Arc<dyn OidcInteraction>> {
    interaction.as_ref().ok_or_else(|| {
        GatehouseError::BadRequest(
            "This action can only be performed as part of an OIDC authentication flow.".to_string(),
        )
    })
}

/// Build a single-entry JSON object
pub(crate) fn single_entry(key: &str, value: Value) -> JsonObject {
    let mut object = JsonObject::new();
    object.insert(key.to_string(), value);
    object
}
