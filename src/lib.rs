pub mod announcements;
pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod memory;
pub mod models;
pub mod password;
pub mod plans;
pub mod stripe;
pub mod superuser;
pub mod token;

use std::sync::Arc;

use crate::announcements::AnnouncementService;
use crate::auth::AuthService;
use crate::billing::BillingService;
use crate::config::Config;
use crate::db::{AnnouncementStore, SubscriptionStore, UserStore};
use crate::password::Passwords;
use crate::stripe::StripeClient;
use crate::superuser::SuperuserToken;
use crate::token::TokenKeys;

/// Store handles, one per capability. The Postgres and in-memory stores both
/// implement all three.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub announcements: Arc<dyn AnnouncementStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
}

impl Stores {
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + AnnouncementStore + SubscriptionStore + 'static,
    {
        Self {
            users: store.clone(),
            announcements: store.clone(),
            subscriptions: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub announcements: Arc<AnnouncementService>,
    pub billing: Arc<BillingService>,
    pub tokens: Arc<TokenKeys>,
    pub superuser: SuperuserToken,
}

impl AppState {
    pub fn new(
        config: &Config,
        stores: Stores,
        superuser: SuperuserToken,
    ) -> Result<Self, bcrypt::BcryptError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .map(str::as_bytes)
            .unwrap_or_else(|| superuser.as_bytes());
        let tokens = Arc::new(TokenKeys::new(
            secret,
            chrono::Duration::hours(config.token_ttl_hours),
        ));

        let passwords = Passwords::new(superuser.as_bytes(), config.bcrypt_cost)?;
        let stripe = StripeClient::new(&config.stripe_key, &config.stripe_api_base);

        Ok(Self {
            auth: Arc::new(AuthService::new(
                stores.users.clone(),
                passwords,
                tokens.clone(),
            )),
            announcements: Arc::new(AnnouncementService::new(stores.announcements)),
            billing: Arc::new(BillingService::new(
                stores.users,
                stores.subscriptions,
                stripe,
                config.plans.clone(),
                &config.stripe_sign_key,
                &config.frontend_url,
            )),
            tokens,
            superuser,
        })
    }
}
