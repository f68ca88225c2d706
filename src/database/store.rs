use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::{FilterData, FilterError};

/// A stored record: a JSON object whose `id` key holds its UUID
pub type Document = Map<String, Value>;

/// Named set of documents and the fields that must be unique within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Collection {
    pub name: &'static str,
    pub unique: &'static [&'static str],
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value '{value}' for unique field '{field}'")]
    DuplicateKey { field: String, value: String },

    #[error("document has no valid id")]
    MissingId,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("stored document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence port used by every resource model
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with `DuplicateKey` when a unique field collides.
    async fn insert(&self, collection: &Collection, doc: Document) -> Result<Document, StoreError>;

    async fn find(&self, collection: &Collection, filter: &FilterData) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &Collection, where_clause: &Value) -> Result<Option<Document>, StoreError> {
        let filter = FilterData {
            where_clause: Some(where_clause.clone()),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.find(collection, &filter).await?.into_iter().next())
    }

    /// Replace the whole document; `None` when no document has that id
    async fn replace(&self, collection: &Collection, id: Uuid, doc: Document) -> Result<Option<Document>, StoreError>;

    /// `true` when a document was removed
    async fn delete(&self, collection: &Collection, id: Uuid) -> Result<bool, StoreError>;

    /// Remove every document in the collection, returning how many were removed
    async fn delete_all(&self, collection: &Collection) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self) {}
}

/// Read the `id` key of a document
pub fn document_id(doc: &Document) -> Result<Uuid, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(StoreError::MissingId)
}

/// Text form of a unique field's value, as reported in duplicate errors
pub fn unique_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
