pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::Repository;
pub use store::{Collection, Document, DocumentStore, StoreError};

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Open the configured store: PostgreSQL when a URL is set, otherwise the
/// in-process memory store.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    if config.url.is_none() {
        warn!("DATABASE_URL not set; using in-memory store (data is lost on exit)");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(config).await?;
    store.migrate(&models::COLLECTIONS).await?;
    info!("Using PostgreSQL document store");
    Ok(Arc::new(store))
}
