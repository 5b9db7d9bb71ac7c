use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::email::{Email, EmailSender};
use super::PasswordStore;
use crate::account::{get_required_account, Account, AccountStore, PASSWORD_LOGIN_METHOD};
use crate::interaction::oidc::single_entry;
use crate::interaction::routing::{route_params, InteractionRoute, RouteParams, ACCOUNT_ID, PASSWORD_ID};
use crate::interaction::{
    parse_input, required_field, validate_email, InteractionHandler, InteractionInput,
    JsonRepresentation,
};
use crate::types::{GatehouseError, Result};

fn check_confirmation(password: &str, confirm: Option<&str>) -> Result<()> {
    match confirm {
        Some(confirm) if confirm != password => Err(GatehouseError::BadRequest(
            "Password confirmation is incorrect.".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Resolve the email of the password login addressed by the request target
///
/// The target has to be the login URL recorded on the account.
fn login_email(
    account: &Account,
    route: &dyn InteractionRoute,
    target: &str,
) -> Result<String> {
    if account.logins.get(PASSWORD_LOGIN_METHOD).map(String::as_str) != Some(target) {
        return Err(GatehouseError::BadRequest("Invalid password URL.".to_string()));
    }
    let encoded = route
        .match_path(target)
        .and_then(|mut params| params.remove(PASSWORD_ID))
        .ok_or_else(|| GatehouseError::BadRequest("Invalid password URL.".to_string()))?;
    urlencoding::decode(&encoded)
        .map(|email| email.into_owned())
        .map_err(|_| GatehouseError::BadRequest("Invalid password URL.".to_string()))
}

#[derive(Deserialize)]
struct LoginInput {
    email: String,
    password: String,
}

/// Authenticates with email and password
///
/// Only outputs the `accountId`; session and OIDC handling happen in
/// `ResolveLoginHandler`.
pub struct PasswordLoginHandler {
    password_store: Arc<dyn PasswordStore>,
}

impl PasswordLoginHandler {
    pub fn new(password_store: Arc<dyn PasswordStore>) -> Self {
        Self { password_store }
    }
}

#[async_trait]
impl InteractionHandler for PasswordLoginHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let LoginInput { email, password } = parse_input(&input.json)?;
        let email = validate_email(&email)?;
        let account_id = self.password_store.authenticate(&email, &password).await?;
        debug!("Password login for {}", email);
        Ok(JsonRepresentation::new(single_entry(
            "accountId",
            Value::String(account_id),
        )))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePasswordInput {
    email: String,
    password: String,
    confirm_password: Option<String>,
}

/// Adds the password login method to the logged-in account
pub struct CreatePasswordHandler {
    password_store: Arc<dyn PasswordStore>,
    account_store: Arc<dyn AccountStore>,
    password_route: Arc<dyn InteractionRoute>,
}

impl CreatePasswordHandler {
    pub fn new(
        password_store: Arc<dyn PasswordStore>,
        account_store: Arc<dyn AccountStore>,
        password_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            password_store,
            account_store,
            password_route,
        }
    }
}

#[async_trait]
impl InteractionHandler for CreatePasswordHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;
        if account.logins.contains_key(PASSWORD_LOGIN_METHOD) {
            return Err(GatehouseError::Conflict(
                "This account already has this login method.".to_string(),
            ));
        }

        let CreatePasswordInput {
            email,
            password,
            confirm_password,
        } = parse_input(&input.json)?;
        let email = validate_email(&email)?;
        let password = required_field(&password, "password")?;
        check_confirmation(&password, confirm_password.as_deref())?;

        let encoded = urlencoding::encode(&email).into_owned();
        let path = self
            .password_route
            .get_path(&route_params([
                (ACCOUNT_ID, account.id.as_str()),
                (PASSWORD_ID, encoded.as_str()),
            ]))
            .ok_or_else(|| GatehouseError::Internal("Unable to generate password URL".into()))?;

        self.password_store.create(&email, &account.id, &password).await?;
        // No verification flow: logins are usable right away
        self.password_store.verify(&email).await?;

        account
            .logins
            .insert(PASSWORD_LOGIN_METHOD.to_string(), path.clone());
        self.account_store.update(&account).await?;
        info!("Added password login {} to account {}", email, account.id);

        Ok(JsonRepresentation::new(single_entry(
            PASSWORD_LOGIN_METHOD,
            Value::String(path),
        )))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordInput {
    old_password: String,
    new_password: String,
    #[serde(default)]
    confirm_password: Option<String>,
}

/// Changes the password of the login addressed by the target
pub struct UpdatePasswordHandler {
    password_store: Arc<dyn PasswordStore>,
    account_store: Arc<dyn AccountStore>,
    password_route: Arc<dyn InteractionRoute>,
}

impl UpdatePasswordHandler {
    pub fn new(
        password_store: Arc<dyn PasswordStore>,
        account_store: Arc<dyn AccountStore>,
        password_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            password_store,
            account_store,
            password_route,
        }
    }
}

#[async_trait]
impl InteractionHandler for UpdatePasswordHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;
        let email = login_email(&account, self.password_route.as_ref(), &input.target)?;
        let UpdatePasswordInput {
            old_password,
            new_password,
            confirm_password,
        } = parse_input(&input.json)?;
        let new_password = required_field(&new_password, "newPassword")?;
        check_confirmation(&new_password, confirm_password.as_deref())?;

        match self.password_store.authenticate(&email, &old_password).await {
            Ok(account_id) if account_id == account.id => {}
            _ => {
                return Err(GatehouseError::BadRequest(
                    "Old password is invalid.".to_string(),
                ))
            }
        }

        self.password_store.change_password(&email, &new_password).await?;
        info!("Changed password of {}", email);
        Ok(JsonRepresentation::empty())
    }
}

/// Removes the password login addressed by the target
///
/// The account reference goes first so the account store can refuse to
/// remove the last login method.
pub struct DeletePasswordHandler {
    password_store: Arc<dyn PasswordStore>,
    account_store: Arc<dyn AccountStore>,
    password_route: Arc<dyn InteractionRoute>,
}

impl DeletePasswordHandler {
    pub fn new(
        password_store: Arc<dyn PasswordStore>,
        account_store: Arc<dyn AccountStore>,
        password_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            password_store,
            account_store,
            password_route,
        }
    }
}

#[async_trait]
impl InteractionHandler for DeletePasswordHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let mut account =
            get_required_account(self.account_store.as_ref(), input.account_id.as_deref()).await?;
        let email = login_email(&account, self.password_route.as_ref(), &input.target)?;

        account.logins.remove(PASSWORD_LOGIN_METHOD);
        self.account_store.update(&account).await?;
        self.password_store.delete(&email).await?;
        info!("Removed password login {} from account {}", email, account.id);
        Ok(JsonRepresentation::empty())
    }
}

#[derive(Deserialize)]
struct ForgotPasswordInput {
    email: String,
}

/// Mails a password reset link
///
/// Answers the same way whether or not the email is known.
pub struct ForgotPasswordHandler {
    password_store: Arc<dyn PasswordStore>,
    email_sender: Arc<dyn EmailSender>,
    reset_route: Arc<dyn InteractionRoute>,
}

impl ForgotPasswordHandler {
    pub fn new(
        password_store: Arc<dyn PasswordStore>,
        email_sender: Arc<dyn EmailSender>,
        reset_route: Arc<dyn InteractionRoute>,
    ) -> Self {
        Self {
            password_store,
            email_sender,
            reset_route,
        }
    }

    async fn send_reset_mail(&self, email: &str, record_id: &str) -> Result<()> {
        let reset_path = self
            .reset_route
            .get_path(&RouteParams::new())
            .ok_or_else(|| GatehouseError::Internal("Unable to generate reset URL".into()))?;
        let link = format!("{}?rid={}", reset_path, urlencoding::encode(record_id));
        self.email_sender
            .send(&Email {
                recipient: email.to_string(),
                subject: "Reset your password".to_string(),
                text: format!(
                    "To reset your password, go to this link: {}\n\nIf you did not request a password reset, you can ignore this email.",
                    link
                ),
            })
            .await
    }
}

#[async_trait]
impl InteractionHandler for ForgotPasswordHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let ForgotPasswordInput { email } = parse_input(&input.json)?;
        let email = validate_email(&email)?;

        match self.password_store.generate_forgot_password_record(&email).await {
            Ok(record_id) => {
                self.send_reset_mail(&email, &record_id).await?;
                info!("Sent password reset mail to {}", email);
            }
            Err(e) => warn!("Password reset requested for unknown email {}: {}", email, e),
        }

        Ok(JsonRepresentation::new(single_entry("email", Value::String(email))))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordInput {
    record_id: String,
    password: String,
    confirm_password: Option<String>,
}

/// Sets a new password using a reset record
pub struct ResetPasswordHandler {
    password_store: Arc<dyn PasswordStore>,
}

impl ResetPasswordHandler {
    pub fn new(password_store: Arc<dyn PasswordStore>) -> Self {
        Self { password_store }
    }
}

#[async_trait]
impl InteractionHandler for ResetPasswordHandler {
    async fn handle(&self, input: &InteractionInput) -> Result<JsonRepresentation> {
        let ResetPasswordInput {
            record_id,
            password,
            confirm_password,
        } = parse_input(&input.json)?;
        let password = required_field(&password, "password")?;
        check_confirmation(&password, confirm_password.as_deref())?;

        let email = self
            .password_store
            .get_forgot_password_record(&record_id)
            .await?
            .ok_or_else(|| {
                GatehouseError::BadRequest(
                    "This reset password link is no longer valid.".to_string(),
                )
            })?;

        self.password_store.change_password(&email, &password).await?;
        self.password_store
            .delete_forgot_password_record(&record_id)
            .await?;
        info!("Reset password of {}", email);
        Ok(JsonRepresentation::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{BaseAccountStore, DEFAULT_COOKIE_TTL_MINUTES};
    use crate::auth::PasswordHasher;
    use crate::interaction::password::{BasePasswordStore, DEFAULT_FORGOT_PASSWORD_EXPIRATION_MINUTES};
    use crate::interaction::routing::{AbsolutePathRoute, IdRoute, RelativePathRoute};
    use hyper::Method;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<Email>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, email: &Email) -> Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct Setup {
        accounts: Arc<dyn AccountStore>,
        passwords: Arc<dyn PasswordStore>,
        route: Arc<dyn InteractionRoute>,
        account_id: String,
    }

    async fn setup() -> Setup {
        let accounts: Arc<dyn AccountStore> =
            Arc::new(BaseAccountStore::in_memory(DEFAULT_COOKIE_TTL_MINUTES));
        let passwords: Arc<dyn PasswordStore> = Arc::new(BasePasswordStore::in_memory(
            PasswordHasher::new(8, 1),
            DEFAULT_FORGOT_PASSWORD_EXPIRATION_MINUTES,
        ));
        let base: Arc<dyn InteractionRoute> =
            Arc::new(AbsolutePathRoute::new("http://srv/.account/account/"));
        let account_route: Arc<dyn InteractionRoute> = Arc::new(IdRoute::new(base, ACCOUNT_ID));
        let logins: Arc<dyn InteractionRoute> =
            Arc::new(RelativePathRoute::new(account_route, "login/password/"));
        let route: Arc<dyn InteractionRoute> = Arc::new(IdRoute::new(logins, PASSWORD_ID));

        let account_id = accounts.create().await.unwrap().id;
        Setup {
            accounts,
            passwords,
            route,
            account_id,
        }
    }

    async fn with_password(setup: &Setup, email: &str, password: &str) -> String {
        let handler = CreatePasswordHandler::new(
            setup.passwords.clone(),
            setup.accounts.clone(),
            setup.route.clone(),
        );
        let input = InteractionInput::new(Method::POST, "http://srv/.account/login/password/")
            .with_account(setup.account_id.clone())
            .with_json(json!({ "email": email, "password": password }));
        let result = handler.handle(&input).await.unwrap();
        result.json["password"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_then_login() {
        let setup = setup().await;
        let path = with_password(&setup, "alice@example.com", "secret").await;
        assert!(path.ends_with("/login/password/alice%40example.com/"));

        let account = setup.accounts.find(&setup.account_id).await.unwrap().unwrap();
        assert_eq!(account.logins[PASSWORD_LOGIN_METHOD], path);

        let login = PasswordLoginHandler::new(setup.passwords.clone());
        let input = InteractionInput::new(Method::POST, "http://srv/.account/login/password/")
            .with_json(json!({ "email": "alice@example.com", "password": "secret" }));
        let result = login.handle(&input).await.unwrap();
        assert_eq!(result.json["accountId"], setup.account_id);

        let input = InteractionInput::new(Method::POST, "http://srv/.account/login/password/")
            .with_json(json!({ "email": "alice@example.com", "password": "wrong" }));
        assert!(login.handle(&input).await.is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_second_login_and_bad_confirmation() {
        let setup = setup().await;
        let handler = CreatePasswordHandler::new(
            setup.passwords.clone(),
            setup.accounts.clone(),
            setup.route.clone(),
        );
        let input = InteractionInput::new(Method::POST, "http://srv/.account/login/password/")
            .with_account(setup.account_id.clone())
            .with_json(json!({ "email": "a@b.c", "password": "x", "confirmPassword": "y" }));
        let err = handler.handle(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "Password confirmation is incorrect.");

        with_password(&setup, "a@b.c", "x").await;
        let input = input.with_json(json!({ "email": "other@b.c", "password": "x" }));
        let err = handler.handle(&input).await.unwrap_err();
        assert!(matches!(err, GatehouseError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_requires_old_password() {
        let setup = setup().await;
        let path = with_password(&setup, "a@b.c", "old").await;
        let handler = UpdatePasswordHandler::new(
            setup.passwords.clone(),
            setup.accounts.clone(),
            setup.route.clone(),
        );

        let input = InteractionInput::new(Method::POST, path.clone())
            .with_account(setup.account_id.clone())
            .with_json(json!({ "oldPassword": "nope", "newPassword": "new" }));
        let err = handler.handle(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "Old password is invalid.");

        let input = input.with_json(json!({
            "oldPassword": "old",
            "newPassword": "new",
            "confirmPassword": "neww",
        }));
        let err = handler.handle(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "Password confirmation is incorrect.");
        assert_eq!(
            setup.passwords.authenticate("a@b.c", "old").await.unwrap(),
            setup.account_id
        );

        let input = input.with_json(json!({
            "oldPassword": "old",
            "newPassword": "new",
            "confirmPassword": "new",
        }));
        handler.handle(&input).await.unwrap();
        assert_eq!(
            setup.passwords.authenticate("a@b.c", "new").await.unwrap(),
            setup.account_id
        );

        let input = InteractionInput::new(Method::POST, "http://srv/.account/account/x/login/password/y/")
            .with_account(setup.account_id.clone())
            .with_json(json!({ "oldPassword": "new", "newPassword": "x" }));
        let err = handler.handle(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid password URL.");
    }

    #[tokio::test]
    async fn test_delete_keeps_last_login() {
        let setup = setup().await;
        let path = with_password(&setup, "a@b.c", "pw").await;
        let handler = DeletePasswordHandler::new(
            setup.passwords.clone(),
            setup.accounts.clone(),
            setup.route.clone(),
        );
        let input = InteractionInput::new(Method::DELETE, path)
            .with_account(setup.account_id.clone());

        let err = handler.handle(&input).await.unwrap_err();
        assert!(matches!(err, GatehouseError::BadRequest(_)));
        // Login record survives the refused update
        assert!(setup.passwords.authenticate("a@b.c", "pw").await.is_ok());

        let mut account = setup.accounts.find(&setup.account_id).await.unwrap().unwrap();
        account
            .logins
            .insert("other".into(), "http://srv/.account/login/other/".into());
        setup.accounts.update(&account).await.unwrap();

        handler.handle(&input).await.unwrap();
        assert!(setup.passwords.authenticate("a@b.c", "pw").await.is_err());
        let account = setup.accounts.find(&setup.account_id).await.unwrap().unwrap();
        assert!(!account.logins.contains_key(PASSWORD_LOGIN_METHOD));
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let setup = setup().await;
        with_password(&setup, "a@b.c", "pw").await;
        let sender = Arc::new(RecordingSender::default());
        let reset_route: Arc<dyn InteractionRoute> =
            Arc::new(AbsolutePathRoute::new("http://srv/.account/login/password/reset/"));
        let forgot =
            ForgotPasswordHandler::new(setup.passwords.clone(), sender.clone(), reset_route);

        let input = InteractionInput::new(Method::POST, "http://srv/.account/login/password/forgot/")
            .with_json(json!({ "email": "unknown@b.c" }));
        let result = forgot.handle(&input).await.unwrap();
        assert_eq!(result.json["email"], "unknown@b.c");
        assert!(sender.sent.lock().unwrap().is_empty());

        let input = input.with_json(json!({ "email": "a@b.c" }));
        forgot.handle(&input).await.unwrap();
        let mail = sender.sent.lock().unwrap().pop().unwrap();
        assert_eq!(mail.recipient, "a@b.c");
        let record_id = mail
            .text
            .split("?rid=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap()
            .to_string();

        let reset = ResetPasswordHandler::new(setup.passwords.clone());
        let input = InteractionInput::new(Method::POST, "http://srv/.account/login/password/reset/")
            .with_json(json!({ "recordId": record_id, "password": "fresh", "confirmPassword": "fresh" }));
        reset.handle(&input).await.unwrap();
        assert_eq!(
            setup.passwords.authenticate("a@b.c", "fresh").await.unwrap(),
            setup.account_id
        );

        let err = reset.handle(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "This reset password link is no longer valid.");
    }
}
