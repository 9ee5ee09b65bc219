use crate::error::{Error, Result};
use crate::models::{Comment, SubmissionClaim, TokenListing, UserIdentity, VoteCounts, VoteRecord, VoteType};
use crate::store::{Collection, CreateOutcome, DocumentStore, NewDocument, StoredDocument};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use crate::metrics;
use log::{debug, warn};

/// Typed access to the document store.
///
/// Loosely shaped documents are decoded into the model structs here, so the
/// rest of the crate never handles raw JSON.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("store", &format_args!("<DocumentStore>"))
            .finish()
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InternalError(format!("failed to encode document: {}", e)))
}

fn decode<T: DeserializeOwned>(collection: Collection, key: &str, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::CorruptDocument {
        collection: collection.to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decodes every document, dropping (and counting) the ones that do not fit `T`.
/// One malformed document must not hide the rest of a collection.
fn decode_all<T, F>(collection: Collection, docs: Vec<StoredDocument>, decode_one: F) -> Vec<T>
where
    F: Fn(StoredDocument) -> Result<T>,
{
    docs.into_iter()
        .filter_map(|doc| {
            let key = doc.key.clone();
            match decode_one(doc) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Skipping {}/{}: {}", collection, key, e);
                    metrics::SKIPPED_DOCUMENTS.with_label_values(&[collection.as_str()]).inc();
                    None
                }
            }
        })
        .collect()
}

fn decode_listing(doc: StoredDocument) -> Result<TokenListing> {
    let mut listing: TokenListing = decode(Collection::Tokens, &doc.key, doc.body)?;
    listing.address = doc.key;
    Ok(listing)
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // Users

    pub async fn get_user(&self, address: &str) -> Result<Option<UserIdentity>> {
        match self.store.get(Collection::Users, address).await? {
            Some(body) => {
                let mut user: UserIdentity = decode(Collection::Users, address, body)?;
                user.address = address.to_string();
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Creates the user document if it does not exist yet. Returns `true` when created.
    pub async fn ensure_user(&self, address: &str) -> Result<bool> {
        let body = encode(&UserIdentity::new(address))?;
        self.store.create_if_absent(Collection::Users, address, body).await
    }

    pub async fn touch_last_login(&self, address: &str, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set_field(Collection::Users, address, &["lastLogin"], encode(&at)?)
            .await
    }

    pub async fn record_submission_on_user(&self, address: &str, token_address: &str, at: DateTime<Utc>) -> Result<()> {
        self.ensure_user(address).await?;
        self.store
            .set_field(Collection::Users, address, &["submissions", token_address], encode(&at)?)
            .await?;
        self.store
            .set_field(Collection::Users, address, &["submittedToken"], Value::Bool(true))
            .await
    }

    pub async fn record_vote_on_user(&self, address: &str, token_address: &str, vote_type: VoteType) -> Result<()> {
        self.ensure_user(address).await?;
        self.store
            .set_field(Collection::Users, address, &["votes", token_address], encode(&vote_type)?)
            .await
    }

    // Submissions

    pub async fn get_submission_claim(&self, identity: &str) -> Result<Option<SubmissionClaim>> {
        match self.store.get(Collection::Submitters, identity).await? {
            Some(body) => Ok(Some(decode(Collection::Submitters, identity, body)?)),
            None => Ok(None),
        }
    }

    /// Writes the submission claim and the listing in one atomic step.
    pub async fn create_claim_and_listing(&self, claim: &SubmissionClaim, listing: &TokenListing) -> Result<CreateOutcome> {
        self.store
            .create_all_if_absent(vec![
                NewDocument::new(Collection::Submitters, claim.identity.clone(), encode(claim)?),
                NewDocument::new(Collection::Tokens, listing.address.clone(), encode(listing)?),
            ])
            .await
    }

    // Tokens

    pub async fn get_token(&self, address: &str) -> Result<Option<TokenListing>> {
        match self.store.get(Collection::Tokens, address).await? {
            Some(body) => decode_listing(StoredDocument {
                key: address.to_string(),
                body,
            })
            .map(Some),
            None => Ok(None),
        }
    }

    /// All listings, newest first.
    pub async fn list_tokens(&self) -> Result<Vec<TokenListing>> {
        let docs = self.store.list(Collection::Tokens).await?;
        let mut listings = decode_all(Collection::Tokens, docs, decode_listing);
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.address.cmp(&b.address)));
        Ok(listings)
    }

    pub async fn increment_counter(&self, token_address: &str, vote_type: VoteType) -> Result<i64> {
        self.store
            .atomic_increment(Collection::Tokens, token_address, vote_type.counter_field(), 1)
            .await
    }

    pub async fn vote_counts(&self, token_address: &str) -> Result<Option<VoteCounts>> {
        Ok(self.get_token(token_address).await?.map(|listing| listing.counts()))
    }

    pub fn watch_tokens(&self) -> watch::Receiver<u64> {
        self.store.changes(Collection::Tokens)
    }

    // Votes

    /// Conditional create on the composite key. Returns `false` when a vote already exists.
    pub async fn create_vote_record(&self, record: &VoteRecord) -> Result<bool> {
        let created = self
            .store
            .create_if_absent(Collection::Votes, &record.key(), encode(record)?)
            .await?;
        debug!("Vote record {} created: {}", record.key(), created);
        Ok(created)
    }

    pub async fn get_vote_record(&self, token_address: &str, voter: &str) -> Result<Option<VoteRecord>> {
        let key = VoteRecord::key_for(token_address, voter);
        match self.store.get(Collection::Votes, &key).await? {
            Some(body) => Ok(Some(decode(Collection::Votes, &key, body)?)),
            None => Ok(None),
        }
    }

    pub async fn list_votes(&self) -> Result<Vec<VoteRecord>> {
        let docs = self.store.list(Collection::Votes).await?;
        Ok(decode_all(Collection::Votes, docs, |doc| {
            decode(Collection::Votes, &doc.key, doc.body)
        }))
    }

    // Comments

    pub async fn create_comment(&self, comment: &Comment) -> Result<bool> {
        self.store
            .create_if_absent(Collection::Comments, &comment.id, encode(comment)?)
            .await
    }

    pub fn watch_comments(&self) -> watch::Receiver<u64> {
        self.store.changes(Collection::Comments)
    }

    pub async fn list_comments(&self, token_address: &str) -> Result<Vec<Comment>> {
        let docs: Vec<StoredDocument> = self
            .store
            .list(Collection::Comments)
            .await?
            .into_iter()
            .filter(|doc| doc.body.get("tokenAddress").and_then(Value::as_str) == Some(token_address))
            .collect();
        let mut comments = decode_all(Collection::Comments, docs, |doc| {
            let mut comment: Comment = decode(Collection::Comments, &doc.key, doc.body)?;
            comment.id = doc.key;
            Ok(comment)
        });
        comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(comments)
    }
}
