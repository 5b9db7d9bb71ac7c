//! HTTP routes for Gatehouse

pub mod account;
pub mod health;

pub use account::{build_account_api, AccountApi, AccountRoutes, AccountServices, AccountSettings};
pub use health::{health_check, version_info};
