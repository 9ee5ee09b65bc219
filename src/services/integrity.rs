//! Submission and vote integrity.
//!
//! Uniqueness is enforced only through the store's conditional creation:
//! the submission claim (keyed by identity) together with the listing (keyed by
//! address) for submissions, and the vote record (keyed by token and identity)
//! for votes. Reads performed beforehand are fast-path rejections, never the
//! gate itself.

use super::gateway::PersistenceGateway;
use super::subscription::{TokenListSubscription, VoteCountSubscription};
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{SubmissionClaim, TokenData, TokenListing, VoteRecord, VoteType};
use crate::store::{Collection, CreateOutcome};
use crate::validation::validate_token_address;
use crate::wallet::Identity;
use chrono::Utc;
use log::{error, info, warn};

#[derive(Debug, Clone)]
pub struct IntegrityEngine {
    gateway: PersistenceGateway,
}

impl IntegrityEngine {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Creates a listing for `token`, consuming the identity's single submission.
    pub async fn submit_token(&self, identity: &Identity, mut token: TokenData) -> Result<TokenListing> {
        // The listing key must be the canonical address, or padded variants would
        // become separate listings for the same mint.
        token.address = validate_token_address(&token.address)?;

        if let Some(user) = self.gateway.get_user(identity.as_str()).await? {
            if user.submitted_token {
                metrics::record_rejection(&Error::AlreadySubmitted);
                return Err(Error::AlreadySubmitted);
            }
        }

        let now = Utc::now();
        let claim = SubmissionClaim {
            identity: identity.to_string(),
            token_address: token.address.clone(),
            claimed_at: now,
        };
        let listing = TokenListing::new(token, identity.as_str());

        match self.gateway.create_claim_and_listing(&claim, &listing).await? {
            CreateOutcome::Created => {}
            CreateOutcome::Conflict { collection, .. } => {
                let err = match collection {
                    Collection::Submitters => Error::AlreadySubmitted,
                    _ => Error::DuplicateToken(listing.address.clone()),
                };
                metrics::record_rejection(&err);
                return Err(err);
            }
        }
        info!("{} submitted token {}", identity, listing.address);
        metrics::SUBMISSIONS.inc();

        // The claim is authoritative; the user flag is a cached view of it.
        if let Err(e) = self
            .gateway
            .record_submission_on_user(identity.as_str(), &listing.address, now)
            .await
        {
            warn!("Submission of {} by {} not mirrored on user: {}", listing.address, identity, e);
        }

        match self.gateway.get_token(&listing.address).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Ok(listing),
            Err(e) => {
                warn!("Created listing {} could not be re-read: {}", listing.address, e);
                Ok(listing)
            }
        }
    }

    /// Records one vote by `identity` on `token_address` and bumps the matching counter.
    pub async fn cast_vote(&self, identity: &Identity, token_address: &str, vote_type: VoteType) -> Result<VoteRecord> {
        if self.gateway.get_token(token_address).await?.is_none() {
            return Err(Error::TokenNotFound(token_address.to_string()));
        }

        let record = VoteRecord {
            token_address: token_address.to_string(),
            voter: identity.to_string(),
            vote_type,
            timestamp: Utc::now(),
        };
        if !self.gateway.create_vote_record(&record).await? {
            metrics::record_rejection(&Error::AlreadyVoted);
            return Err(Error::AlreadyVoted);
        }

        if let Err(e) = self.gateway.increment_counter(token_address, vote_type).await {
            error!(
                "Vote by {} on {} recorded without counter update: {}",
                identity, token_address, e
            );
            metrics::PARTIAL_WRITES.inc();
            return Err(Error::PartialWriteAnomaly {
                token_address: token_address.to_string(),
                field: vote_type.counter_field().to_string(),
                reason: e.to_string(),
            });
        }
        info!("{} voted {} on {}", identity, vote_type, token_address);
        metrics::VOTES.with_label_values(&[&vote_type.to_string()]).inc();

        if let Err(e) = self
            .gateway
            .record_vote_on_user(identity.as_str(), token_address, vote_type)
            .await
        {
            warn!("Vote on {} by {} not mirrored on user: {}", token_address, identity, e);
        }
        Ok(record)
    }

    pub fn subscribe_token_changes(&self) -> TokenListSubscription {
        TokenListSubscription::new(self.gateway.clone())
    }

    pub async fn subscribe_single_token(&self, token_address: &str) -> Result<VoteCountSubscription> {
        VoteCountSubscription::open(self.gateway.clone(), token_address).await
    }
}
