use std::sync::Arc;
use std::time::Duration;

use crate::store::{Store, TxBackend};
use crate::token::TokenAuthenticator;
use crate::user_auth::UserAuthService;

/// Gateway application state (shared)
pub struct AppState<B: TxBackend> {
    /// Transactional store
    pub store: Arc<Store<B>>,
    /// Access token issue/verify
    pub tokens: Arc<dyn TokenAuthenticator>,
    /// Registration and login
    pub users: UserAuthService<B>,
}

impl<B: TxBackend> AppState<B> {
    pub fn new(
        store: Arc<Store<B>>,
        tokens: Arc<dyn TokenAuthenticator>,
        access_token_duration: Duration,
    ) -> Self {
        let users = UserAuthService::new(store.clone(), tokens.clone(), access_token_duration);
        Self {
            store,
            tokens,
            users,
        }
    }
}
