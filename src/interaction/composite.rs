//! Generic handler combinators

use async_trait::async_trait;
use hyper::Method;
use serde_json::Value;
use std::sync::Arc;

use super::{InteractionHandler, InteractionInput, JsonObject, JsonRepresentation};
use crate::types::{GatehouseError, Result};

/// Rejects requests whose method is not in the allowed set
pub struct MethodFilterHandler {
    methods: Vec<Method>,
    source: Arc<dyn InteractionHandler>,
}

impl MethodFilterHandler {
    pub fn new(methods: Vec<Method>, source: Arc<dyn InteractionHandler>) -> Self {
        Self { methods, source }
    }
}

#[async_trait]
impl InteractionHandler for MethodFilterHandler {
    async fn can_handle(&self, input: &InteractionInput) -> Result<()> {
        if !self.methods.contains(&input.method) {
            return Err(GatehouseError::MethodNotAllowed {
                method: input.method.to_string(),
            });
        }
        self.source.can_handle(input).await
    }

    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        self.source.handle(input).await
    }
}

/// Dispatches to the first child that can handle the input
///
/// When no child applies, the error is `NotFound` if every child reported
/// that, otherwise the first more specific error (e.g. a wrong method on a
/// route that does exist).
pub struct WaterfallHandler {
    handlers: Vec<Arc<dyn InteractionHandler>>,
}

impl WaterfallHandler {
    pub fn new(handlers: Vec<Arc<dyn InteractionHandler>>) -> Self {
        Self { handlers }
    }

    async fn find_handler(&self, input: &InteractionInput) -> Result<&Arc<dyn InteractionHandler>> {
        let mut specific: Option<GatehouseError> = None;
        for handler in &self.handlers {
            match handler.can_handle(input).await {
                Ok(()) => return Ok(handler),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    if specific.is_none() {
                        specific = Some(e);
                    }
                }
            }
        }
        Err(specific.unwrap_or_else(|| {
            GatehouseError::NotFound(format!("{} not found", input.target))
        }))
    }
}

#[async_trait]
impl InteractionHandler for WaterfallHandler {
    async fn can_handle(&self, input: &InteractionInput) -> Result<()> {
        self.find_handler(input).await.map(|_| ())
    }

    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        self.find_handler(input).await?.handle(input).await
    }

    async fn handle_safe(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        self.handle(input).await
    }
}

/// Always answers with the same JSON object
pub struct StaticJsonHandler {
    json: JsonObject,
}

impl StaticJsonHandler {
    /// Non-object values produce an empty object
    pub fn new(json: Value) -> Self {
        let json = match json {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        Self { json }
    }
}

#[async_trait]
impl InteractionHandler for StaticJsonHandler {
    async fn handle(&self, _input: &InteractionInput) -> Result<JsonRepresentation> {
        Ok(JsonRepresentation::new(self.json.clone()))
    }
}
