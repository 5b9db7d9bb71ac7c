//! Client credential tokens
//!
//! A token lets a script authenticate as one of an account's WebIDs without
//! an interactive login. Tokens live in their own storage, keyed by token
//! id, and are checked against the account every time they are used.

mod adapter;

pub use adapter::{ClientAdapter, ClientCredentialsAdapter, ClientPayload, MemoryClientAdapter};

use serde::{Deserialize, Serialize};

/// Stored credential token
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentials {
    pub account_id: String,
    pub secret: String,
    /// WebID the token authenticates as
    pub web_id: String,
}
