// chat-client/src/context.rs
use common::Config;
use std::sync::Arc;

use crate::identity::IdentityProvider;

/// Application-wide collaborators, built once at startup and handed to
/// every actor that needs them
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppContext {
    pub fn new(config: Config, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config: Arc::new(config),
            identity,
        }
    }
}
