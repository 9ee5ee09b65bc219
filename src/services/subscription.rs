//! Push subscriptions over the token and comment collections.
//!
//! Every subscription kind delivers snapshots, never deltas: each delivery is
//! the complete current state read from the store after a change was observed.
//! Changes that land while a snapshot is being read are folded into the next
//! delivery, so the last delivery always reflects the latest write.
//!
//! `next()` is cancel-safe. A delivery stays owed until its read has finished,
//! so dropping a pending `next()` (for example inside `tokio::select!`) only
//! postpones that delivery to the following call.

use super::gateway::PersistenceGateway;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{Comment, TokenListing, VoteCounts};
use tokio::sync::watch;
use log::debug;

/// Change signal shared by the subscription kinds.
#[derive(Debug)]
struct Trigger {
    changes: watch::Receiver<u64>,
    owed: bool,
}

impl Trigger {
    /// The first delivery is owed immediately.
    fn new(changes: watch::Receiver<u64>) -> Self {
        Self { changes, owed: true }
    }

    /// Waits until a delivery is owed. Returns `false` once the feed is closed.
    async fn wait(&mut self) -> bool {
        if !self.owed {
            if self.changes.changed().await.is_err() {
                return false;
            }
            self.owed = true;
        }
        // Seen before the read, so a write racing the read triggers another delivery.
        let version = *self.changes.borrow_and_update();
        debug!("Snapshot owed at version {}", version);
        true
    }

    /// Called once the read finished, successfully or not.
    fn settle(&mut self) {
        self.owed = false;
    }
}

/// Live sequence of full listing snapshots, newest listing first.
#[derive(Debug)]
pub struct TokenListSubscription {
    gateway: PersistenceGateway,
    trigger: Trigger,
}

impl TokenListSubscription {
    pub(crate) fn new(gateway: PersistenceGateway) -> Self {
        let trigger = Trigger::new(gateway.watch_tokens());
        metrics::ACTIVE_SUBSCRIPTIONS.inc();
        Self { gateway, trigger }
    }

    /// Waits for the next snapshot. The first call returns the current state
    /// immediately. Returns `Ok(None)` once the change feed is closed.
    pub async fn next(&mut self) -> Result<Option<Vec<TokenListing>>> {
        if !self.trigger.wait().await {
            return Ok(None);
        }
        let listings = self.gateway.list_tokens().await;
        self.trigger.settle();
        listings.map(Some)
    }

    /// Stops deliveries and releases the channel.
    pub fn unsubscribe(self) {}
}

impl Drop for TokenListSubscription {
    fn drop(&mut self) {
        metrics::ACTIVE_SUBSCRIPTIONS.dec();
    }
}

/// Live counters of a single listing. Deliveries with unchanged counters are skipped.
#[derive(Debug)]
pub struct VoteCountSubscription {
    gateway: PersistenceGateway,
    token_address: String,
    trigger: Trigger,
    last: Option<VoteCounts>,
}

impl VoteCountSubscription {
    /// Fails with `TokenNotFound` when the listing does not exist.
    pub(crate) async fn open(gateway: PersistenceGateway, token_address: &str) -> Result<Self> {
        let changes = gateway.watch_tokens();
        if gateway.get_token(token_address).await?.is_none() {
            return Err(Error::TokenNotFound(token_address.to_string()));
        }
        metrics::ACTIVE_SUBSCRIPTIONS.inc();
        Ok(Self {
            gateway,
            token_address: token_address.to_string(),
            trigger: Trigger::new(changes),
            last: None,
        })
    }

    pub fn token_address(&self) -> &str {
        &self.token_address
    }

    pub async fn next(&mut self) -> Result<Option<VoteCounts>> {
        loop {
            if !self.trigger.wait().await {
                return Ok(None);
            }
            let read = self.gateway.vote_counts(&self.token_address).await;
            self.trigger.settle();

            let counts = match read? {
                Some(counts) => counts,
                // Listings are never deleted; treat a missing read as no news.
                None if self.last.is_some() => continue,
                None => return Err(Error::TokenNotFound(self.token_address.clone())),
            };

            if self.last != Some(counts) {
                self.last = Some(counts);
                return Ok(Some(counts));
            }
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for VoteCountSubscription {
    fn drop(&mut self) {
        metrics::ACTIVE_SUBSCRIPTIONS.dec();
    }
}

/// Live comment thread of one listing, newest first. Writes to other threads are not delivered.
#[derive(Debug)]
pub struct CommentSubscription {
    gateway: PersistenceGateway,
    token_address: String,
    trigger: Trigger,
    last: Option<Vec<Comment>>,
}

impl CommentSubscription {
    /// Fails with `TokenNotFound` when the listing does not exist.
    pub(crate) async fn open(gateway: PersistenceGateway, token_address: &str) -> Result<Self> {
        let changes = gateway.watch_comments();
        if gateway.get_token(token_address).await?.is_none() {
            return Err(Error::TokenNotFound(token_address.to_string()));
        }
        metrics::ACTIVE_SUBSCRIPTIONS.inc();
        Ok(Self {
            gateway,
            token_address: token_address.to_string(),
            trigger: Trigger::new(changes),
            last: None,
        })
    }

    pub fn token_address(&self) -> &str {
        &self.token_address
    }

    pub async fn next(&mut self) -> Result<Option<Vec<Comment>>> {
        loop {
            if !self.trigger.wait().await {
                return Ok(None);
            }
            let comments = self.gateway.list_comments(&self.token_address).await;
            self.trigger.settle();
            let comments = comments?;

            if self.last.as_ref() != Some(&comments) {
                self.last = Some(comments.clone());
                return Ok(Some(comments));
            }
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for CommentSubscription {
    fn drop(&mut self) {
        metrics::ACTIVE_SUBSCRIPTIONS.dec();
    }
}
