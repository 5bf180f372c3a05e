use crate::server::registry::{OciRegistryClient, RegistryClient};
use crate::server::settings::Settings;
use std::sync::Arc;

/// Shared state for the HTTP server. Everything request-scoped lives in the
/// handlers; this only carries the registry client seam.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn RegistryClient>,
}

impl AppState {
    pub fn new(_settings: &Settings) -> Self {
        Self {
            registry: Arc::new(OciRegistryClient::new()),
        }
    }

    #[cfg(test)]
    pub fn with_registry(registry: Arc<dyn RegistryClient>) -> Self {
        Self { registry }
    }
}
