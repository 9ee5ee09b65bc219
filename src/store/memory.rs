use super::{stamp_created_at, ChangeFeed, Collection, CreateOutcome, DocumentStore, NewDocument, StoredDocument};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{watch, RwLock};
use log::debug;

type Documents = HashMap<Collection, BTreeMap<String, Value>>;

/// In-process document store. All writes take the same lock, so conditional
/// creates and increments are linearizable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<Documents>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.documents
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }
}

fn not_found(collection: Collection, key: &str) -> Error {
    Error::NotFound {
        collection: collection.to_string(),
        key: key.to_string(),
    }
}

fn corrupt(collection: Collection, key: &str, reason: impl Into<String>) -> Error {
    Error::CorruptDocument {
        collection: collection.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_if_absent(&self, collection: Collection, key: &str, mut body: Value) -> Result<bool> {
        let mut documents = self.documents.write().await;
        let docs = documents.entry(collection).or_default();
        if docs.contains_key(key) {
            debug!("{}/{} already exists", collection, key);
            return Ok(false);
        }
        stamp_created_at(&mut body);
        docs.insert(key.to_string(), body);
        drop(documents);

        self.feed.notify(collection);
        Ok(true)
    }

    async fn create_all_if_absent(&self, new_documents: Vec<NewDocument>) -> Result<CreateOutcome> {
        let mut documents = self.documents.write().await;

        for doc in &new_documents {
            let exists = documents
                .get(&doc.collection)
                .map(|docs| docs.contains_key(&doc.key))
                .unwrap_or(false);
            if exists {
                return Ok(CreateOutcome::Conflict {
                    collection: doc.collection,
                    key: doc.key.clone(),
                });
            }
        }

        let mut touched = Vec::new();
        for mut doc in new_documents {
            stamp_created_at(&mut doc.body);
            documents.entry(doc.collection).or_default().insert(doc.key, doc.body);
            if !touched.contains(&doc.collection) {
                touched.push(doc.collection);
            }
        }
        drop(documents);

        for collection in touched {
            self.feed.notify(collection);
        }
        Ok(CreateOutcome::Created)
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoredDocument>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, body)| StoredDocument {
                        key: key.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn atomic_increment(&self, collection: Collection, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| not_found(collection, key))?;
        let map = doc
            .as_object_mut()
            .ok_or_else(|| corrupt(collection, key, "document is not an object"))?;

        let current = match map.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| corrupt(collection, key, format!("field '{}' is not an integer", field)))?,
        };
        let updated = current + delta;
        map.insert(field.to_string(), Value::from(updated));
        drop(documents);

        self.feed.notify(collection);
        Ok(updated)
    }

    async fn set_field(&self, collection: Collection, key: &str, path: &[&str], value: Value) -> Result<()> {
        let (last, parents) = path
            .split_last()
            .ok_or_else(|| Error::InvalidInput("empty field path".to_string()))?;

        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| not_found(collection, key))?;

        let mut target = doc
            .as_object_mut()
            .ok_or_else(|| corrupt(collection, key, "document is not an object"))?;
        for segment in parents {
            target = target
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .ok_or_else(|| corrupt(collection, key, format!("field '{}' is not an object", segment)))?;
        }
        target.insert(last.to_string(), value);
        drop(documents);

        self.feed.notify(collection);
        Ok(())
    }

    fn changes(&self, collection: Collection) -> watch::Receiver<u64> {
        self.feed.subscribe(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_if_absent_rejects_existing_key() {
        let store = MemoryStore::new();
        assert!(store.create_if_absent(Collection::Votes, "t_a", json!({"v": 1})).await.unwrap());
        assert!(!store.create_if_absent(Collection::Votes, "t_a", json!({"v": 2})).await.unwrap());

        let doc = store.get(Collection::Votes, "t_a").await.unwrap().unwrap();
        assert_eq!(doc["v"], json!(1));
        assert!(doc.get("createdAt").is_some());
    }

    #[tokio::test]
    async fn test_create_all_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.create_if_absent(Collection::Tokens, "tok", json!({})).await.unwrap();

        let outcome = store
            .create_all_if_absent(vec![
                NewDocument::new(Collection::Submitters, "alice", json!({})),
                NewDocument::new(Collection::Tokens, "tok", json!({})),
            ])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CreateOutcome::Conflict {
                collection: Collection::Tokens,
                key: "tok".to_string()
            }
        );
        assert!(store.get(Collection::Submitters, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .atomic_increment(Collection::Tokens, "nope", "buyVotes", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.create_if_absent(Collection::Tokens, "tok", json!({})).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.atomic_increment(Collection::Tokens, "tok", "buyVotes", 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = store.get(Collection::Tokens, "tok").await.unwrap().unwrap();
        assert_eq!(doc["buyVotes"], json!(50));
    }

    #[tokio::test]
    async fn test_set_field_creates_nested_objects() {
        let store = MemoryStore::new();
        store.create_if_absent(Collection::Users, "alice", json!({"address": "alice"})).await.unwrap();

        store
            .set_field(Collection::Users, "alice", &["votes", "tok"], json!("bullish"))
            .await
            .unwrap();

        let doc = store.get(Collection::Users, "alice").await.unwrap().unwrap();
        assert_eq!(doc["votes"]["tok"], json!("bullish"));
        assert_eq!(doc["address"], json!("alice"));
    }

    #[tokio::test]
    async fn test_writes_notify_watchers() {
        let store = MemoryStore::new();
        let mut changes = store.changes(Collection::Tokens);

        store.create_if_absent(Collection::Tokens, "tok", json!({})).await.unwrap();
        changes.changed().await.unwrap();

        store.atomic_increment(Collection::Tokens, "tok", "byeVotes", 1).await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), 2);
    }
}
