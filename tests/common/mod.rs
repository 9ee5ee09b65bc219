#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use std::sync::Arc;
use tokio::sync::watch;
use token_vote_board::api::{MetadataSource, TokenMetadata};
use token_vote_board::config::ListingConfig;
use token_vote_board::error::{Error, Result};
use token_vote_board::services::TokenBoard;
use token_vote_board::store::{Collection, CreateOutcome, DocumentStore, MemoryStore, NewDocument, StoredDocument};
use token_vote_board::wallet::WalletSession;

pub fn address() -> String {
    Pubkey::new_unique().to_string()
}

pub fn wallet() -> WalletSession {
    WalletSession::connected(address())
}

/// Metadata source with a fixed answer.
pub enum StubMetadata {
    Found(TokenMetadata),
    Unknown,
    Unreachable,
}

impl StubMetadata {
    pub fn named(name: &str, symbol: &str) -> Self {
        StubMetadata::Found(TokenMetadata {
            name: name.to_string(),
            symbol: symbol.to_string(),
            image: format!("https://example.com/{}.png", symbol.to_lowercase()),
        })
    }
}

#[async_trait]
impl MetadataSource for StubMetadata {
    async fn fetch_metadata(&self, _address: &str) -> Result<Option<TokenMetadata>> {
        match self {
            StubMetadata::Found(metadata) => Ok(Some(metadata.clone())),
            StubMetadata::Unknown => Ok(None),
            StubMetadata::Unreachable => Err(Error::TransientNetworkFailure("connection refused".into())),
        }
    }
}

pub fn board_on(store: Arc<dyn DocumentStore>, metadata: StubMetadata) -> TokenBoard {
    TokenBoard::new(store, Arc::new(metadata), ListingConfig::default())
}

pub fn memory_board() -> (Arc<MemoryStore>, TokenBoard) {
    let store = Arc::new(MemoryStore::new());
    let board = board_on(store.clone(), StubMetadata::named("Foo", "FOO"));
    (store, board)
}

/// Memory store whose counter increments can be switched to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_increments: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_increments: AtomicBool::new(false),
        }
    }

    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create_if_absent(&self, collection: Collection, key: &str, body: Value) -> Result<bool> {
        self.inner.create_if_absent(collection, key, body).await
    }

    async fn create_all_if_absent(&self, documents: Vec<NewDocument>) -> Result<CreateOutcome> {
        self.inner.create_all_if_absent(documents).await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        self.inner.get(collection, key).await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoredDocument>> {
        self.inner.list(collection).await
    }

    async fn atomic_increment(&self, collection: Collection, key: &str, field: &str, delta: i64) -> Result<i64> {
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(Error::TransientNetworkFailure("write timed out".into()));
        }
        self.inner.atomic_increment(collection, key, field, delta).await
    }

    async fn set_field(&self, collection: Collection, key: &str, path: &[&str], value: Value) -> Result<()> {
        self.inner.set_field(collection, key, path, value).await
    }

    fn changes(&self, collection: Collection) -> watch::Receiver<u64> {
        self.inner.changes(collection)
    }
}

/// Memory store whose reads can be slowed down, to cancel readers mid-flight.
pub struct SlowStore {
    inner: MemoryStore,
    read_delay_ms: AtomicU64,
}

impl SlowStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            read_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn pause(&self) {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn create_if_absent(&self, collection: Collection, key: &str, body: Value) -> Result<bool> {
        self.inner.create_if_absent(collection, key, body).await
    }

    async fn create_all_if_absent(&self, documents: Vec<NewDocument>) -> Result<CreateOutcome> {
        self.inner.create_all_if_absent(documents).await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        self.pause().await;
        self.inner.get(collection, key).await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoredDocument>> {
        self.pause().await;
        self.inner.list(collection).await
    }

    async fn atomic_increment(&self, collection: Collection, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.inner.atomic_increment(collection, key, field, delta).await
    }

    async fn set_field(&self, collection: Collection, key: &str, path: &[&str], value: Value) -> Result<()> {
        self.inner.set_field(collection, key, path, value).await
    }

    fn changes(&self, collection: Collection) -> watch::Receiver<u64> {
        self.inner.changes(collection)
    }
}
