//! Document store abstraction.
//!
//! The store is a keyed JSON document service with two atomic primitives the
//! integrity layer depends on: conditional creation (fails if the key exists)
//! and in-place counter increment. Every write bumps a per-collection change
//! version that subscribers observe through a `watch` channel.

use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use tokio::sync::watch;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Field stamped on every document at creation time.
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Tokens,
    Submitters,
    Votes,
    Comments,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Tokens,
        Collection::Submitters,
        Collection::Votes,
        Collection::Comments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tokens => "tokens",
            Collection::Submitters => "submitters",
            Collection::Votes => "votes",
            Collection::Comments => "comments",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub collection: Collection,
    pub key: String,
    pub body: Value,
}

impl NewDocument {
    pub fn new(collection: Collection, key: impl Into<String>, body: Value) -> Self {
        Self {
            collection,
            key: key.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The first document (in request order) whose key already existed.
    Conflict { collection: Collection, key: String },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the document only if the key is free. Returns `false` when it already existed.
    async fn create_if_absent(&self, collection: Collection, key: &str, body: Value) -> Result<bool>;

    /// Creates all documents or none of them.
    async fn create_all_if_absent(&self, documents: Vec<NewDocument>) -> Result<CreateOutcome>;

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>>;

    async fn list(&self, collection: Collection) -> Result<Vec<StoredDocument>>;

    /// Adds `delta` to a numeric top-level field, treating a missing field as 0.
    /// Fails with `NotFound` when the document does not exist.
    async fn atomic_increment(&self, collection: Collection, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Sets a (possibly nested) field on an existing document.
    async fn set_field(&self, collection: Collection, key: &str, path: &[&str], value: Value) -> Result<()>;

    /// Change version of a collection; bumped after every successful write to it.
    fn changes(&self, collection: Collection) -> watch::Receiver<u64>;
}

/// Per-collection change versions shared by store implementations.
#[derive(Debug)]
pub struct ChangeFeed {
    senders: Vec<watch::Sender<u64>>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            senders: Collection::ALL.iter().map(|_| watch::channel(0u64).0).collect(),
        }
    }

    pub fn notify(&self, collection: Collection) {
        self.senders[collection.index()].send_modify(|version| *version += 1);
    }

    pub fn subscribe(&self, collection: Collection) -> watch::Receiver<u64> {
        self.senders[collection.index()].subscribe()
    }
}

/// Adds the server-side creation timestamp to an object document.
pub(crate) fn stamp_created_at(body: &mut Value) {
    if let Value::Object(map) = body {
        map.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::parse(collection.as_str()), Some(collection));
        }
        assert_eq!(Collection::parse("bogus"), None);
    }

    #[tokio::test]
    async fn test_change_feed_bumps_only_the_written_collection() {
        let feed = ChangeFeed::new();
        let mut tokens = feed.subscribe(Collection::Tokens);
        let votes = feed.subscribe(Collection::Votes);

        feed.notify(Collection::Tokens);

        tokens.changed().await.unwrap();
        assert_eq!(*tokens.borrow(), 1);
        assert!(!votes.has_changed().unwrap());
    }

    #[test]
    fn test_stamp_created_at_only_touches_objects() {
        let mut doc = json!({"name": "Foo"});
        stamp_created_at(&mut doc);
        assert!(doc.get(CREATED_AT_FIELD).is_some());

        let mut scalar = json!(5);
        stamp_created_at(&mut scalar);
        assert_eq!(scalar, json!(5));
    }
}
