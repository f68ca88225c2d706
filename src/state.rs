use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::Resource;
use crate::database::{DocumentStore, Repository};
use crate::mail::Mailer;
use crate::server::Supervisor;

/// Shared handles passed to every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub mailer: Arc<dyn Mailer>,
    pub supervisor: Supervisor,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            mailer,
            supervisor,
        }
    }

    pub fn repository<T: Resource>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }
}
