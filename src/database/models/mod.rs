pub mod sample;
pub mod user;
pub mod validation;

pub use sample::{Category, NewSample, Sample, SamplePatch};
pub use user::{NewUser, Role, User, UserPatch};
pub use validation::ValidationErrors;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::store::{Collection, Document, StoreError};
use crate::config::SecurityConfig;
use crate::error::AppError;

/// Every collection the application persists
pub const COLLECTIONS: [Collection; 2] = [User::COLLECTION, Sample::COLLECTION];

/// A persisted resource type served by the generic CRUD handlers.
///
/// `build` and `apply` are the explicit lifecycle steps: they validate input
/// and run any pre-save work (password hashing) before the store sees the
/// record.
#[async_trait]
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    const COLLECTION: Collection;
    /// Key for a single record in response envelopes and messages
    const NAME: &'static str;
    /// Key for a list of records in response envelopes
    const PLURAL: &'static str;
    /// Stored but never returned unless also listed in `OPT_IN_FIELDS`
    const HIDDEN_FIELDS: &'static [&'static str] = &[];
    /// Hidden fields a client may request with `fields=+name`
    const OPT_IN_FIELDS: &'static [&'static str] = &[];

    type Create: DeserializeOwned + Send;
    type Patch: DeserializeOwned + Send;

    fn id(&self) -> Uuid;

    /// Condition merged into every query for this resource
    fn default_filter() -> Option<Value> {
        None
    }

    async fn build(input: Self::Create, security: &SecurityConfig) -> Result<Self, AppError>;

    async fn apply(&mut self, patch: Self::Patch, security: &SecurityConfig) -> Result<(), AppError>;

    fn to_document(&self) -> Result<Document, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(StoreError::MissingId),
        }
    }

    fn from_document(doc: Document) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(Value::Object(doc))?)
    }

    /// Client-facing form with hidden fields removed and `select` applied
    fn to_public(&self, select: Option<&[String]>) -> Result<Value, StoreError> {
        let mut doc = self.to_document()?;
        project(&mut doc, select, Self::HIDDEN_FIELDS, Self::OPT_IN_FIELDS);
        Ok(Value::Object(doc))
    }

    /// Fields clients may not filter or sort on
    fn protected_fields() -> Vec<&'static str> {
        Self::HIDDEN_FIELDS
            .iter()
            .copied()
            .filter(|f| !Self::OPT_IN_FIELDS.contains(f))
            .collect()
    }
}

fn project(doc: &mut Document, select: Option<&[String]>, hidden: &[&str], opt_in: &[&str]) {
    let select = select.unwrap_or_default();
    let included: Vec<&str> = select
        .iter()
        .filter_map(|f| f.strip_prefix('+'))
        .filter(|f| opt_in.contains(f))
        .collect();
    let picked: Vec<&str> = select
        .iter()
        .filter(|f| !f.starts_with('+'))
        .map(String::as_str)
        .collect();

    doc.retain(|key, _| {
        let key = key.as_str();
        if hidden.contains(&key) && !included.contains(&key) {
            return false;
        }
        picked.is_empty() || key == "id" || picked.contains(&key) || included.contains(&key)
    });
}
