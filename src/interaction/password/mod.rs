//! Email/password login method
//!
//! Logins are stored per email address, independently of the account. The
//! account only records the URL of its password login under
//! `PASSWORD_LOGIN_METHOD`; that URL carries the url-encoded email as its
//! `passwordId`.

mod email;
mod handlers;
mod store;

pub use email::{Email, EmailSender, LogEmailSender};
pub use handlers::{
    CreatePasswordHandler, DeletePasswordHandler, ForgotPasswordHandler, PasswordLoginHandler,
    ResetPasswordHandler, UpdatePasswordHandler,
};
pub use store::{BasePasswordStore, ForgotPasswordPayload, LoginPayload, DEFAULT_FORGOT_PASSWORD_EXPIRATION_MINUTES};

use async_trait::async_trait;

use crate::types::Result;

/// Storage of email/password logins and password reset records
#[async_trait]
pub trait PasswordStore: Send + Sync {
    /// Check the credentials and return the id of the account they log in to
    async fn authenticate(&self, email: &str, password: &str) -> Result<String>;

    /// Store a new, unverified login; fails if the email is taken
    async fn create(&self, email: &str, account_id: &str, password: &str) -> Result<()>;

    /// Mark a login as verified; unverified logins can not authenticate
    async fn verify(&self, email: &str) -> Result<()>;

    async fn change_password(&self, email: &str, password: &str) -> Result<()>;

    /// Delete the login of this email, returning whether it existed
    async fn delete(&self, email: &str) -> Result<bool>;

    /// Create a short-lived password reset record, returning its id
    async fn generate_forgot_password_record(&self, email: &str) -> Result<String>;

    /// Email belonging to a reset record, if it has not expired
    async fn get_forgot_password_record(&self, record_id: &str) -> Result<Option<String>>;

    async fn delete_forgot_password_record(&self, record_id: &str) -> Result<()>;
}
