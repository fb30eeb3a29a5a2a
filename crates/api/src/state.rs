//! Application state

use sqlx::PgPool;

use talentry_subscriptions::SubscriptionCore;

use crate::auth::JwtManager;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt: JwtManager,
    pub core: SubscriptionCore,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret);
        let core = SubscriptionCore::postgres(pool.clone());
        Self {
            pool,
            config,
            jwt,
            core,
        }
    }
}
