//! Interaction handler pipeline
//!
//! Every account action (registration, login, pod creation, WebID linking,
//! credential tokens) is an `InteractionHandler`. Handlers compose by
//! wrapping: a `RouteHandler` guards a leaf with a URL, a `ControlHandler`
//! decorates its source with discovery links, and so on. The tree is built
//! once at start-up in `crate::routes`.

pub mod account;
pub mod composite;
pub mod control;
pub mod credentials;
pub mod oidc;
pub mod password;
pub mod pod;
pub mod registration;
pub mod resolve_login;
pub mod routing;
pub mod webid;

pub use account::{AccountViewHandler, CreateAccountHandler, LogoutHandler};
pub use composite::{MethodFilterHandler, StaticJsonHandler, WaterfallHandler};
pub use control::{AccountControlHandler, ControlHandler, StaticControlHandler, API_VERSION};
pub use credentials::{CreateCredentialsHandler, DeleteCredentialsHandler};
pub use oidc::{finish_interaction, DisabledInteractionProvider, InteractionProvider, OidcInteraction};
pub use registration::RegistrationHandler;
pub use resolve_login::ResolveLoginHandler;
pub use routing::{InteractionRoute, RouteHandler, RouteParams};
pub use webid::{PromptHandler, WebIdLinker, WebIdPicker, WebIdUnlinker};

use async_trait::async_trait;
use hyper::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::types::{GatehouseError, Result};

/// JSON object as produced and consumed by handlers
pub type JsonObject = serde_json::Map<String, Value>;

/// Metadata parsed from the incoming request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Session cookie value, if the request carried one
    pub account_cookie: Option<String>,
}

/// Metadata a handler wants attached to the response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// New session cookie to set on the client
    pub account_cookie: Option<String>,
    /// Value for the `Location` header
    pub location: Option<String>,
}

impl ResponseMetadata {
    /// Copy every field set in `other` over this one
    pub fn merge(&mut self, other: ResponseMetadata) {
        if other.account_cookie.is_some() {
            self.account_cookie = other.account_cookie;
        }
        if other.location.is_some() {
            self.location = other.location;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_cookie.is_none() && self.location.is_none()
    }
}

/// Result of a handler: a JSON object plus optional response metadata
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonRepresentation {
    pub json: JsonObject,
    pub metadata: Option<ResponseMetadata>,
}

impl JsonRepresentation {
    pub fn new(json: JsonObject) -> Self {
        Self {
            json,
            metadata: None,
        }
    }

    /// Representation with an empty JSON object
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Everything a handler knows about the request it is processing
#[derive(Clone)]
pub struct InteractionInput {
    pub method: Method,
    /// Full URL of the request target
    pub target: String,
    pub metadata: RequestMetadata,
    /// Parsed request body, an empty object when there was none
    pub json: Value,
    /// Active OIDC interaction, when the request is part of a login flow
    pub oidc_interaction: Option<Arc<dyn OidcInteraction>>,
    /// Account resolved from the session cookie
    pub account_id: Option<String>,
}

impl InteractionInput {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            metadata: RequestMetadata::default(),
            json: Value::Object(JsonObject::new()),
            oidc_interaction: None,
            account_id: None,
        }
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = json;
        self
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.metadata.account_cookie = Some(cookie.into());
        self
    }

    pub fn with_oidc(mut self, interaction: Arc<dyn OidcInteraction>) -> Self {
        self.oidc_interaction = Some(interaction);
        self
    }
}

impl fmt::Debug for InteractionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionInput")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("account_id", &self.account_id)
            .field("oidc", &self.oidc_interaction.is_some())
            .finish()
    }
}

/// A unit of the interaction pipeline
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Fail without side effects if this handler does not apply to the input
    async fn can_handle(&self, _input: &InteractionInput) -> Result<()> {
        Ok(())
    }

    /// Perform the action; assumes `can_handle` succeeded
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation>;

    /// Run `can_handle` followed by `handle`
    async fn handle_safe(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        self.can_handle(input).await?;
        self.handle(input).await
    }
}

/// Deserialize handler input, turning schema mismatches into validation errors
pub fn parse_input<T: DeserializeOwned>(json: &Value) -> Result<T> {
    if !json.is_object() {
        return Err(GatehouseError::BadRequest(
            "Input must be a JSON object.".to_string(),
        ));
    }
    serde_json::from_value(json.clone())
        .map_err(|e| GatehouseError::BadRequest(format!("Invalid input: {}", e)))
}

/// Trim a required string field, rejecting empty values
pub fn required_field(value: &str, name: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GatehouseError::BadRequest(format!("{} is required.", name)));
    }
    Ok(trimmed.to_string())
}

/// Minimal structural email check: `local@domain` without whitespace
pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(GatehouseError::BadRequest(format!(
            "{} is not a valid email address.",
            email
        )));
    }
    Ok(email.to_string())
}

/// Replace every non-word character so the value is safe inside a URL segment
pub fn sanitize_url_part(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}
