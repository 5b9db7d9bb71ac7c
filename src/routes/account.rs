//! The account API: its URL layout and handler tree
//!
//! Every route lives under the account base URL (default `/.account/`).
//! Responses of the whole tree carry the discovery `controls`.

use hyper::Method;
use serde_json::json;
use std::sync::Arc;

use crate::account::AccountStore;
use crate::credentials::ClientCredentials;
use crate::interaction::password::{
    CreatePasswordHandler, DeletePasswordHandler, EmailSender, ForgotPasswordHandler,
    PasswordLoginHandler, PasswordStore, ResetPasswordHandler, UpdatePasswordHandler,
};
use crate::interaction::pod::{
    CreatePodArgs, CreatePodHandler, PodManager, SuffixIdentifierGenerator,
};
use crate::interaction::routing::{
    join_url, AbsolutePathRoute, IdRoute, RelativePathRoute, ACCOUNT_ID, CREDENTIALS_ID,
    PASSWORD_ID, POD_ID, WEB_ID_HASH,
};
use crate::interaction::webid::OwnershipValidator;
use crate::interaction::{
    AccountControlHandler, AccountViewHandler, ControlHandler, CreateAccountHandler,
    CreateCredentialsHandler, DeleteCredentialsHandler, InteractionHandler, InteractionRoute,
    LogoutHandler, MethodFilterHandler, PromptHandler, RegistrationHandler, ResolveLoginHandler,
    RouteHandler, StaticControlHandler, StaticJsonHandler, WaterfallHandler, WebIdLinker,
    WebIdPicker, WebIdUnlinker,
};
use crate::storage::KeyValueStorage;

type Route = Arc<dyn InteractionRoute>;
type Handler = Arc<dyn InteractionHandler>;

/// Every URL of the account API
pub struct AccountRoutes {
    pub index: Route,
    pub register: Route,
    pub create_account: Route,
    pub account: Route,
    pub logout: Route,
    pub pods: Route,
    pub pod: Route,
    pub web_ids: Route,
    pub web_id: Route,
    pub client_credentials: Route,
    pub client_credential: Route,
    pub passwords: Route,
    pub password: Route,
    pub password_login: Route,
    pub forgot_password: Route,
    pub reset_password: Route,
    pub oidc_prompt: Route,
    pub oidc_pick_web_id: Route,
}

impl AccountRoutes {
    pub fn new(account_base_url: &str) -> Self {
        let absolute = |path: &str| -> Route {
            Arc::new(AbsolutePathRoute::new(&join_url(account_base_url, path)))
        };
        let relative = |base: &Route, path: &str| -> Route {
            Arc::new(RelativePathRoute::new(base.clone(), path))
        };
        let id = |base: &Route, name: &str| -> Route { Arc::new(IdRoute::new(base.clone(), name)) };

        let create_account = absolute("account/");
        let account = id(&create_account, ACCOUNT_ID);
        let pods = relative(&account, "pod/");
        let web_ids = relative(&account, "webid/");
        let client_credentials = relative(&account, "client-credentials/");
        let passwords = relative(&account, "login/password/");

        Self {
            index: absolute(""),
            register: absolute("register/"),
            logout: relative(&account, "logout/"),
            pod: id(&pods, POD_ID),
            web_id: id(&web_ids, WEB_ID_HASH),
            client_credential: id(&client_credentials, CREDENTIALS_ID),
            password: id(&passwords, PASSWORD_ID),
            password_login: absolute("login/password/"),
            forgot_password: absolute("login/password/forgot/"),
            reset_password: absolute("login/password/reset/"),
            oidc_prompt: absolute("oidc/prompt/"),
            oidc_pick_web_id: absolute("oidc/pick-webid/"),
            create_account,
            account,
            pods,
            web_ids,
            client_credentials,
            passwords,
        }
    }
}

/// Stores and external collaborators the handlers work with
#[derive(Clone)]
pub struct AccountServices {
    pub account_store: Arc<dyn AccountStore>,
    pub password_store: Arc<dyn PasswordStore>,
    pub credentials_storage: Arc<dyn KeyValueStorage<ClientCredentials>>,
    pub pod_manager: Arc<dyn PodManager>,
    pub ownership_validator: Arc<dyn OwnershipValidator>,
    pub email_sender: Arc<dyn EmailSender>,
}

#[derive(Clone, Debug)]
pub struct AccountSettings {
    /// Server base URL with trailing slash
    pub base_url: String,
    /// Account API root, e.g. `http://localhost:3000/.account/`
    pub account_base_url: String,
    pub web_id_suffix: String,
    pub allow_root_pod: bool,
}

/// The assembled account API
pub struct AccountApi {
    pub routes: AccountRoutes,
    /// Entry point for every request under the account base URL
    pub handler: Handler,
    /// Multi-step registration, also used to seed accounts
    pub registration: Handler,
}

fn get(handler: Handler) -> (Method, Handler) {
    (Method::GET, handler)
}

fn post(handler: Handler) -> (Method, Handler) {
    (Method::POST, handler)
}

fn delete(handler: Handler) -> (Method, Handler) {
    (Method::DELETE, handler)
}

/// Bind per-method handlers to a route
fn route(route: &Route, methods: Vec<(Method, Handler)>) -> Handler {
    let by_method = methods
        .into_iter()
        .map(|(method, handler)| -> Handler {
            Arc::new(MethodFilterHandler::new(vec![method], handler))
        })
        .collect();
    Arc::new(RouteHandler::new(
        route.clone(),
        Arc::new(WaterfallHandler::new(by_method)),
    ))
}

/// Build the handler tree of the account API
pub fn build_account_api(services: &AccountServices, settings: &AccountSettings) -> AccountApi {
    let routes = AccountRoutes::new(&settings.account_base_url);
    let store = services.account_store.clone();
    let passwords = services.password_store.clone();
    let empty: Handler = Arc::new(StaticJsonHandler::new(json!({})));

    let create_account: Handler = Arc::new(CreateAccountHandler::new(
        store.clone(),
        routes.account.clone(),
    ));
    let create_password: Handler = Arc::new(CreatePasswordHandler::new(
        passwords.clone(),
        store.clone(),
        routes.password.clone(),
    ));
    let create_pod: Handler = Arc::new(CreatePodHandler::new(CreatePodArgs {
        pod_manager: services.pod_manager.clone(),
        identifier_generator: Arc::new(SuffixIdentifierGenerator::new(&settings.base_url)),
        web_id_suffix: settings.web_id_suffix.clone(),
        account_store: store.clone(),
        pod_route: routes.pod.clone(),
        web_id_route: routes.web_id.clone(),
        base_url: settings.base_url.clone(),
        allow_root: settings.allow_root_pod,
    }));
    let link_web_id: Handler = Arc::new(WebIdLinker::new(
        &settings.base_url,
        services.ownership_validator.clone(),
        store.clone(),
        routes.web_id.clone(),
    ));
    let registration: Handler = Arc::new(RegistrationHandler::new(
        create_account.clone(),
        create_password.clone(),
        create_pod.clone(),
        link_web_id.clone(),
    ));
    let password_login: Handler = Arc::new(ResolveLoginHandler::new(
        Arc::new(PasswordLoginHandler::new(passwords.clone())),
        store.clone(),
        routes.account.clone(),
    ));

    let api: Handler = Arc::new(WaterfallHandler::new(vec![
        route(&routes.index, vec![get(empty.clone())]),
        route(&routes.register, vec![get(empty.clone()), post(registration.clone())]),
        route(&routes.create_account, vec![get(empty.clone()), post(create_account)]),
        route(
            &routes.account,
            vec![get(Arc::new(AccountViewHandler::new(store.clone())))],
        ),
        route(
            &routes.logout,
            vec![post(Arc::new(LogoutHandler::new(store.clone())))],
        ),
        route(&routes.pods, vec![get(empty.clone()), post(create_pod)]),
        route(&routes.web_ids, vec![get(empty.clone()), post(link_web_id)]),
        route(
            &routes.web_id,
            vec![delete(Arc::new(WebIdUnlinker::new(store.clone())))],
        ),
        route(
            &routes.client_credentials,
            vec![
                get(empty.clone()),
                post(Arc::new(CreateCredentialsHandler::new(
                    store.clone(),
                    services.credentials_storage.clone(),
                    routes.client_credential.clone(),
                ))),
            ],
        ),
        route(
            &routes.client_credential,
            vec![delete(Arc::new(DeleteCredentialsHandler::new(
                store.clone(),
                services.credentials_storage.clone(),
            )))],
        ),
        route(&routes.passwords, vec![get(empty.clone()), post(create_password)]),
        route(
            &routes.password,
            vec![
                post(Arc::new(UpdatePasswordHandler::new(
                    passwords.clone(),
                    store.clone(),
                    routes.password.clone(),
                ))),
                delete(Arc::new(DeletePasswordHandler::new(
                    passwords.clone(),
                    store.clone(),
                    routes.password.clone(),
                ))),
            ],
        ),
        route(&routes.password_login, vec![get(empty.clone()), post(password_login)]),
        route(
            &routes.forgot_password,
            vec![
                get(empty.clone()),
                post(Arc::new(ForgotPasswordHandler::new(
                    passwords.clone(),
                    services.email_sender.clone(),
                    routes.reset_password.clone(),
                ))),
            ],
        ),
        route(
            &routes.reset_password,
            vec![
                get(empty.clone()),
                post(Arc::new(ResetPasswordHandler::new(passwords))),
            ],
        ),
        route(
            &routes.oidc_prompt,
            vec![get(Arc::new(PromptHandler::new(vec![
                ("login", routes.password_login.clone()),
                ("consent", routes.oidc_pick_web_id.clone()),
            ])))],
        ),
        route(
            &routes.oidc_pick_web_id,
            vec![get(empty.clone()), post(Arc::new(WebIdPicker::new(store)))],
        ),
    ]));

    let controls: Vec<(String, Handler)> = vec![
        (
            "main".to_string(),
            Arc::new(StaticControlHandler::new(vec![
                ("index", routes.index.clone()),
                ("register", routes.register.clone()),
            ])) as Handler,
        ),
        (
            "account".to_string(),
            Arc::new(AccountControlHandler::new(vec![
                ("create", routes.create_account.clone()),
                ("account", routes.account.clone()),
                ("logout", routes.logout.clone()),
                ("pod", routes.pods.clone()),
                ("webId", routes.web_ids.clone()),
                ("clientCredentials", routes.client_credentials.clone()),
            ])) as Handler,
        ),
        (
            "password".to_string(),
            Arc::new(AccountControlHandler::new(vec![
                ("create", routes.passwords.clone()),
                ("login", routes.password_login.clone()),
                ("forgot", routes.forgot_password.clone()),
                ("reset", routes.reset_password.clone()),
            ])) as Handler,
        ),
        (
            "oidc".to_string(),
            Arc::new(StaticControlHandler::new(vec![
                ("prompt", routes.oidc_prompt.clone()),
                ("webId", routes.oidc_pick_web_id.clone()),
            ])) as Handler,
        ),
    ];

    AccountApi {
        handler: Arc::new(ControlHandler::new(api, "controls", controls)),
        registration,
        routes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::routing::{route_params, RouteParams};
    use proptest::prelude::*;

    const BASE: &str = "http://srv/.account/";

    #[test]
    fn test_route_layout() {
        let routes = AccountRoutes::new(BASE);
        let none = RouteParams::new();
        let params = route_params([(ACCOUNT_ID, "abc"), (POD_ID, "alice")]);

        assert_eq!(routes.index.get_path(&none).as_deref(), Some(BASE));
        assert_eq!(
            routes.password_login.get_path(&none).as_deref(),
            Some("http://srv/.account/login/password/")
        );
        assert_eq!(routes.account.get_path(&none), None);
        assert_eq!(
            routes.pod.get_path(&params).as_deref(),
            Some("http://srv/.account/account/abc/pod/alice/")
        );
    }

    #[test]
    fn test_routes_do_not_overlap() {
        let routes = AccountRoutes::new(BASE);
        let all = [
            &routes.index,
            &routes.register,
            &routes.create_account,
            &routes.account,
            &routes.logout,
            &routes.pods,
            &routes.pod,
            &routes.web_ids,
            &routes.web_id,
            &routes.client_credentials,
            &routes.client_credential,
            &routes.passwords,
            &routes.password,
            &routes.password_login,
            &routes.forgot_password,
            &routes.reset_password,
            &routes.oidc_prompt,
            &routes.oidc_pick_web_id,
        ];
        let params = route_params([
            (ACCOUNT_ID, "a"),
            (POD_ID, "p"),
            (WEB_ID_HASH, "w"),
            (CREDENTIALS_ID, "c"),
            (PASSWORD_ID, "x"),
        ]);

        for (i, route) in all.iter().enumerate() {
            let path = route.get_path(&params).unwrap();
            let matching = all.iter().filter(|r| r.match_path(&path).is_some()).count();
            assert_eq!(matching, 1, "{} (route {}) is ambiguous", path, i);
        }
    }

    proptest! {
        #[test]
        fn prop_route_round_trip(
            account in "[A-Za-z0-9-]{1,36}",
            credential in "[A-Za-z0-9_-]{1,40}",
            email in "[a-z0-9.]{1,12}@[a-z0-9]{1,12}\\.[a-z]{2,4}",
        ) {
            let routes = AccountRoutes::new(BASE);
            let encoded = urlencoding::encode(&email).into_owned();

            let params = route_params([(ACCOUNT_ID, account.as_str()), (CREDENTIALS_ID, credential.as_str())]);
            let path = routes.client_credential.get_path(&params).unwrap();
            prop_assert_eq!(routes.client_credential.match_path(&path), Some(params));

            let params = route_params([(ACCOUNT_ID, account.as_str()), (PASSWORD_ID, encoded.as_str())]);
            let path = routes.password.get_path(&params).unwrap();
            prop_assert_eq!(routes.password.match_path(&path), Some(params));

            let params = route_params([(ACCOUNT_ID, account.as_str())]);
            let path = routes.logout.get_path(&params).unwrap();
            prop_assert_eq!(routes.logout.match_path(&path), Some(params));
        }
    }
}
