//! Assembly of stores, handlers and background tasks

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::account::{Account, AccountStore, BaseAccountStore};
use crate::auth::PasswordHasher;
use crate::config::Args;
use crate::credentials::{ClientAdapter, ClientCredentials, ClientCredentialsAdapter, MemoryClientAdapter};
use crate::init::SeededAccountInitializer;
use crate::interaction::password::{
    BasePasswordStore, EmailSender, ForgotPasswordPayload, LoginPayload,
};
use crate::interaction::pod::InMemoryPodManager;
use crate::interaction::webid::StaticOwnershipValidator;
use crate::interaction::{InteractionHandler, InteractionProvider};
use crate::notifications::{self, SubscriptionInfo, WebSocketRegistry};
use crate::routes::{build_account_api, AccountRoutes, AccountServices, AccountSettings};
use crate::server::AppState;
use crate::storage::{spawn_cleanup_task, MemoryStorage};
use crate::types::{GatehouseError, Result};

/// A fully wired Gatehouse instance backed by in-memory storage
pub struct Gatehouse {
    pub state: Arc<AppState>,
    pub routes: AccountRoutes,
    pub registration: Arc<dyn InteractionHandler>,
    pub pod_manager: Arc<InMemoryPodManager>,
    accounts: Arc<MemoryStorage<Account>>,
    cookies: Arc<MemoryStorage<String>>,
    forgot_password: Arc<MemoryStorage<ForgotPasswordPayload>>,
    subscriptions: Arc<MemoryStorage<SubscriptionInfo>>,
}

impl Gatehouse {
    pub fn new(
        args: Args,
        interaction_provider: Arc<dyn InteractionProvider>,
        email_sender: Arc<dyn EmailSender>,
    ) -> Self {
        let accounts = Arc::new(MemoryStorage::<Account>::new());
        let cookies = Arc::new(MemoryStorage::<String>::new());
        let forgot_password = Arc::new(MemoryStorage::<ForgotPasswordPayload>::new());
        let subscriptions = Arc::new(MemoryStorage::<SubscriptionInfo>::new());
        let credentials = Arc::new(MemoryStorage::<ClientCredentials>::new());

        let account_store: Arc<dyn AccountStore> = Arc::new(BaseAccountStore::new(
            accounts.clone(),
            Arc::new(MemoryStorage::<String>::new()),
            cookies.clone(),
            args.cookie_ttl_minutes,
        ));
        let password_store = Arc::new(BasePasswordStore::new(
            Arc::new(MemoryStorage::<LoginPayload>::new()),
            forgot_password.clone(),
            PasswordHasher::new(args.password_memory_kib, args.password_iterations),
            args.forgot_password_minutes,
        ));
        let pod_manager = Arc::new(InMemoryPodManager::new());

        let services = AccountServices {
            account_store: account_store.clone(),
            password_store,
            credentials_storage: credentials.clone(),
            pod_manager: pod_manager.clone(),
            ownership_validator: Arc::new(StaticOwnershipValidator::new(args.allow_external_webids)),
            email_sender,
        };
        let settings = AccountSettings {
            base_url: args.base_url(),
            account_base_url: args.account_base_url(),
            web_id_suffix: args.web_id_suffix.clone(),
            allow_root_pod: args.allow_root_pod,
        };
        let api = build_account_api(&services, &settings);

        let client_adapter: Arc<dyn ClientAdapter> = Arc::new(ClientCredentialsAdapter::new(
            Arc::new(MemoryClientAdapter::new()),
            account_store.clone(),
            credentials,
        ));

        let state = Arc::new(AppState {
            args,
            account_store,
            account_api: api.handler,
            interaction_provider,
            client_adapter,
            sockets: Arc::new(WebSocketRegistry::new(subscriptions.clone())),
            started_at: Instant::now(),
        });

        Self {
            state,
            routes: api.routes,
            registration: api.registration,
            pod_manager,
            accounts,
            cookies,
            forgot_password,
            subscriptions,
        }
    }

    /// Start the periodic sweeps of expired entries and sockets
    pub fn spawn_background_tasks(&self) {
        let args = &self.state.args;
        let interval = Duration::from_secs(args.storage_sweep_seconds);
        spawn_cleanup_task("Account storage", self.accounts.clone(), interval);
        spawn_cleanup_task("Session cookies", self.cookies.clone(), interval);
        spawn_cleanup_task("Password reset records", self.forgot_password.clone(), interval);
        spawn_cleanup_task("Notification subscriptions", self.subscriptions.clone(), interval);
        notifications::spawn_cleanup_task(
            self.state.sockets.clone(),
            Duration::from_secs(args.socket_sweep_minutes.saturating_mul(60)),
        );
    }

    /// Register the accounts of the configured seed file, if any
    pub async fn seed_accounts(&self) -> Result<usize> {
        let Some(ref path) = self.state.args.seeded_accounts else {
            return Ok(0);
        };
        let registration_url = self
            .routes
            .register
            .get_path(&Default::default())
            .ok_or_else(|| GatehouseError::Internal("Unable to generate registration URL".into()))?;
        info!("Seeding accounts from {}", path.display());
        SeededAccountInitializer::new(self.registration.clone(), registration_url, path.clone())
            .run()
            .await
    }
}
