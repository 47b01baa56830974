//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Arc<Config>, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }
}
