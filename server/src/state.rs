use std::sync::Arc;

use crate::auth::JwtService;
use crate::config::Config;
use crate::store::Store;

/// Shared handles built once at startup and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: JwtService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let jwt = JwtService::new(
            &config.auth_secret,
            config.auth_issuer.clone(),
            config.auth_token_ttl_hours,
        );

        Self {
            store,
            jwt,
            config: Arc::new(config),
        }
    }
}
