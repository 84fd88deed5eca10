use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Passwords, TokenIssuer};
use crate::config::Config;
use crate::service::Services;
use crate::storage::Storage;

/// Shared by every handler through an `Extension` layer.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub passwords: Arc<Passwords>,
    pub timeout: Duration,
}

impl AppState {
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Self {
        let passwords = Arc::new(Passwords::new(config.password_rounds));
        let services = Services::new(storage, Arc::clone(&passwords), TokenIssuer::new(config));
        Self {
            services: Arc::new(services),
            passwords,
            timeout: config.request_timeout,
        }
    }
}
