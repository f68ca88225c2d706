use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{document_id, unique_value, Collection, Document, DocumentStore, StoreError};
use crate::filter::filter_order::FilterOrder;
use crate::filter::types::{FilterOp, FilterOrderInfo, SortDirection};
use crate::filter::{Condition, FilterData, FilterWhere};

/// In-process store used in development and tests. Each collection keeps
/// documents in insertion order; unique checks happen under the write lock.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(
        collection: &Collection,
        docs: &[Document],
        candidate: &Document,
        skip: Option<Uuid>,
    ) -> Result<(), StoreError> {
        for field in collection.unique {
            let Some(value) = candidate.get(*field).and_then(unique_value) else {
                continue;
            };
            let taken = docs.iter().any(|doc| {
                skip.map_or(true, |id| document_id(doc).ok() != Some(id))
                    && doc.get(*field).and_then(unique_value).as_deref() == Some(value.as_str())
            });
            if taken {
                return Err(StoreError::DuplicateKey {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &Collection, doc: Document) -> Result<Document, StoreError> {
        document_id(&doc)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.name).or_default();
        Self::check_unique(collection, docs, &doc, None)?;
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find(&self, collection: &Collection, filter: &FilterData) -> Result<Vec<Document>, StoreError> {
        let condition = match &filter.where_clause {
            Some(where_clause) => FilterWhere::parse(where_clause)?,
            None => Condition::And(vec![]),
        };
        let order = match &filter.order {
            Some(order) => FilterOrder::validate_and_parse(order)?,
            None => vec![],
        };

        let collections = self.collections.read().await;
        let mut found: Vec<Document> = collections
            .get(collection.name)
            .map(|docs| docs.iter().filter(|doc| matches(&condition, doc)).cloned().collect())
            .unwrap_or_default();
        drop(collections);

        // Stable sort keeps insertion order between equal keys
        if !order.is_empty() {
            found.sort_by(|a, b| compare_documents(a, b, &order));
        }

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn replace(&self, collection: &Collection, id: Uuid, doc: Document) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.name).or_default();
        let Some(index) = docs.iter().position(|d| document_id(d).ok() == Some(id)) else {
            return Ok(None);
        };
        Self::check_unique(collection, docs, &doc, Some(id))?;
        docs[index] = doc.clone();
        Ok(Some(doc))
    }

    async fn delete(&self, collection: &Collection, id: Uuid) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection.name) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| document_id(d).ok() != Some(id));
        Ok(docs.len() < before)
    }

    async fn delete_all(&self, collection: &Collection) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections.remove(collection.name).map_or(0, |docs| docs.len() as u64))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Evaluate a parsed condition against one document
pub fn matches(condition: &Condition, doc: &Document) -> bool {
    match condition {
        Condition::And(children) => children.iter().all(|c| matches(c, doc)),
        Condition::Or(children) => children.iter().any(|c| matches(c, doc)),
        Condition::Not(child) => !matches(child, doc),
        Condition::Field(info) => {
            let actual = doc.get(&info.column).filter(|v| !v.is_null());
            match info.operator {
                FilterOp::Eq => values_equal(actual, &info.data),
                FilterOp::Ne => !values_equal(actual, &info.data),
                FilterOp::Gt => compare_values(actual, &info.data) == Some(Ordering::Greater),
                FilterOp::Gte => matches!(compare_values(actual, &info.data), Some(Ordering::Greater | Ordering::Equal)),
                FilterOp::Lt => compare_values(actual, &info.data) == Some(Ordering::Less),
                FilterOp::Lte => matches!(compare_values(actual, &info.data), Some(Ordering::Less | Ordering::Equal)),
                FilterOp::In => info
                    .data
                    .as_array()
                    .is_some_and(|values| values.iter().any(|v| values_equal(actual, v))),
            }
        }
    }
}

fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(a), b) => compare_values(Some(a), b) == Some(Ordering::Equal) || a == b,
    }
}

/// Like-typed comparison; `None` when the values are not comparable
fn compare_values(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// Cross-type ordering follows jsonb: null < string < number < boolean < array < object
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::String(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::Bool(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_documents(a: &Document, b: &Document, order: &[FilterOrderInfo]) -> Ordering {
    for info in order {
        let (va, vb) = (a.get(&info.column), b.get(&info.column));
        let ordering = match (type_rank(va), type_rank(vb)) {
            // Missing values sort last ascending, like SQL NULLs
            (0, 0) => Ordering::Equal,
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            (ra, rb) if ra != rb => ra.cmp(&rb),
            _ => va
                .and_then(|va| compare_values(Some(va), vb.unwrap_or(&Value::Null)))
                .unwrap_or(Ordering::Equal),
        };
        let ordering = match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLES: Collection = Collection {
        name: "samples",
        unique: &["email"],
    };

    fn doc(value: Value) -> Document {
        let mut doc = value.as_object().cloned().unwrap_or_default();
        doc.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
        doc
    }

    #[tokio::test]
    async fn enforces_unique_fields() {
        let store = MemoryStore::new();
        store.insert(&SAMPLES, doc(json!({"email": "a@b.com"}))).await.unwrap();
        let err = store.insert(&SAMPLES, doc(json!({"email": "a@b.com"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn replace_may_keep_its_own_unique_value() {
        let store = MemoryStore::new();
        let mut original = store.insert(&SAMPLES, doc(json!({"email": "a@b.com"}))).await.unwrap();
        let id = document_id(&original).unwrap();
        original.insert("text".to_string(), json!("changed"));
        let replaced = store.replace(&SAMPLES, id, original).await.unwrap();
        assert_eq!(replaced.unwrap()["text"], "changed");
    }

    #[tokio::test]
    async fn filters_sorts_and_pages() {
        let store = MemoryStore::new();
        for (i, category) in ["one", "two", "one", "three"].iter().enumerate() {
            store
                .insert(&SAMPLES, doc(json!({"email": format!("{}@x.com", i), "category": category, "rank": i})))
                .await
                .unwrap();
        }

        let filter = FilterData {
            where_clause: Some(json!({"category": {"$in": ["one", "three"]}})),
            order: Some(json!("-rank")),
            limit: Some(2),
            offset: Some(0),
            ..Default::default()
        };
        let found = store.find(&SAMPLES, &filter).await.unwrap();
        let ranks: Vec<_> = found.iter().map(|d| d["rank"].clone()).collect();
        assert_eq!(ranks, vec![json!(3), json!(2)]);
    }

    #[test]
    fn not_equal_matches_missing_fields() {
        let condition = FilterWhere::parse(&json!({"active": {"$ne": false}})).unwrap();
        assert!(matches(&condition, &doc(json!({}))));
        assert!(matches(&condition, &doc(json!({"active": true}))));
        assert!(!matches(&condition, &doc(json!({"active": false}))));
    }

    #[test]
    fn comparisons_require_like_types() {
        let condition = FilterWhere::parse(&json!({"expires": {"$gt": 100}})).unwrap();
        assert!(matches(&condition, &doc(json!({"expires": 150}))));
        assert!(!matches(&condition, &doc(json!({"expires": "150"}))));
        assert!(!matches(&condition, &doc(json!({}))));
    }
}
