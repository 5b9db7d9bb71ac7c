//! Gatehouse - account, identity and access-control core for a pod server
//!
//! Gatehouse manages user accounts, the WebIDs linked to them, password
//! logins, pod ownership and credential tokens, and decides which access
//! modes a requester has on a resource.
//!
//! ## Components
//!
//! - **Storage**: key-value contracts with an in-memory, expiring backend
//! - **Accounts**: the account document, session cookies and the WebID index
//! - **Interaction**: composable handlers behind the `/.account/` JSON API
//! - **Credentials**: client-credential tokens and their revalidation
//! - **Auth**: password hashing and permission readers
//! - **Notifications**: open sockets per subscription

pub mod account;
pub mod app;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod init;
pub mod interaction;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod storage;
pub mod types;

pub use app::Gatehouse;
pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatehouseError, Result};
