use std::sync::Arc;

use crate::auth::password::CredentialVerifier;
use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::RepositoryProvider;

/// Shared, read-only application state handed to every handler and middleware.
/// Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub credentials: CredentialVerifier,
    pub repositories: Arc<dyn RepositoryProvider>,
}

impl AppState {
    pub fn new(config: AppConfig, repositories: Arc<dyn RepositoryProvider>) -> Self {
        let tokens = TokenService::from_config(&config.security);
        let credentials = CredentialVerifier::new(Some(config.security.bcrypt_cost));

        Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            credentials,
            repositories,
        }
    }
}
