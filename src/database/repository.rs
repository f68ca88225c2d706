use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::Resource;
use crate::database::store::{DocumentStore, StoreError};
use crate::error::AppError;
use crate::filter::FilterData;

/// Typed access to one collection. Every query is scoped by the resource's
/// default filter.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Resource> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    fn scoped(where_clause: Option<Value>) -> Option<Value> {
        match (T::default_filter(), where_clause) {
            (None, where_clause) => where_clause,
            (Some(default), None) => Some(default),
            (Some(default), Some(where_clause)) => Some(json!({ "$and": [default, where_clause] })),
        }
    }

    pub async fn select_any(&self, mut filter_data: FilterData) -> Result<Vec<T>, StoreError> {
        filter_data.where_clause = Self::scoped(filter_data.where_clause.take());
        self.store
            .find(&T::COLLECTION, &filter_data)
            .await?
            .into_iter()
            .map(T::from_document)
            .collect()
    }

    pub async fn select_one(&self, where_clause: Value) -> Result<Option<T>, StoreError> {
        let scoped = Self::scoped(Some(where_clause)).unwrap_or(Value::Null);
        self.store
            .find_one(&T::COLLECTION, &scoped)
            .await?
            .map(T::from_document)
            .transpose()
    }

    pub async fn select_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        self.select_one(json!({ "id": id.to_string() })).await
    }

    /// Record with the given id, or the resource's 404
    pub async fn select_404(&self, id: Uuid) -> Result<T, AppError> {
        self.select_id(id).await?.ok_or_else(not_found::<T>)
    }

    pub async fn insert(&self, record: &T) -> Result<T, StoreError> {
        let doc = self.store.insert(&T::COLLECTION, record.to_document()?).await?;
        T::from_document(doc)
    }

    /// Persist the whole record; `None` when it no longer exists
    pub async fn save(&self, record: &T) -> Result<Option<T>, StoreError> {
        self.store
            .replace(&T::COLLECTION, record.id(), record.to_document()?)
            .await?
            .map(T::from_document)
            .transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.store.delete(&T::COLLECTION, id).await
    }

    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        self.store.delete_all(&T::COLLECTION).await
    }
}

pub fn not_found<T: Resource>() -> AppError {
    AppError::not_found(format!("No {} found with that ID", T::NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, Environment};
    use crate::database::memory::MemoryStore;
    use crate::database::models::{NewUser, User};

    async fn user(repo: &Repository<User>, email: &str) -> User {
        let mut security = AppConfig::for_environment(Environment::Development).security;
        security.bcrypt_cost = 4;
        let input = NewUser {
            name: Some("Test".to_string()),
            email: Some(email.to_string()),
            password: Some("pass1234".to_string()),
            password_confirm: Some("pass1234".to_string()),
            role: None,
        };
        let user = User::build(input, &security).await.unwrap();
        repo.insert(&user).await.unwrap()
    }

    #[tokio::test]
    async fn inactive_records_are_invisible() {
        let repo = Repository::<User>::new(Arc::new(MemoryStore::new()));
        let mut alice = user(&repo, "alice@example.com").await;
        user(&repo, "bob@example.com").await;

        alice.active = false;
        repo.save(&alice).await.unwrap();

        assert!(repo.select_id(alice.id).await.unwrap().is_none());
        let all = repo.select_any(FilterData::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].email, "bob@example.com");
    }

    #[tokio::test]
    async fn missing_record_gives_resource_404() {
        let repo = Repository::<User>::new(Arc::new(MemoryStore::new()));
        let err = repo.select_404(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.message(), "No user found with that ID");
    }
}
