//! Application state shared across handlers.

use crate::service::ConfigService;

#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
}

impl AppState {
    pub fn new(config: ConfigService) -> Self {
        Self { config }
    }
}
