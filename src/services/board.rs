use super::comments::CommentService;
use super::gateway::PersistenceGateway;
use super::integrity::IntegrityEngine;
use super::listing::{ListingPage, ListingQuery};
use super::subscription::{CommentSubscription, TokenListSubscription, VoteCountSubscription};
use super::users::{Eligibility, UserService};
use crate::api::{resolve_token_data, MetadataSource};
use crate::config::ListingConfig;
use crate::error::{Error, Result};
use crate::models::{Comment, TokenListing, UserIdentity, VoteRecord, VoteType};
use crate::store::DocumentStore;
use crate::validation::{validate_search, validate_token_address};
use crate::wallet::IdentitySource;
use std::sync::Arc;

/// Entry point for client-facing operations.
///
/// Every write resolves the caller's identity first, so a disconnected wallet
/// is rejected before any network call is made.
#[derive(Clone)]
pub struct TokenBoard {
    engine: IntegrityEngine,
    users: UserService,
    comments: CommentService,
    metadata: Arc<dyn MetadataSource>,
    listing: ListingConfig,
}

impl TokenBoard {
    pub fn new(store: Arc<dyn DocumentStore>, metadata: Arc<dyn MetadataSource>, listing: ListingConfig) -> Self {
        let gateway = PersistenceGateway::new(store);
        Self {
            engine: IntegrityEngine::new(gateway.clone()),
            users: UserService::new(gateway.clone()),
            comments: CommentService::new(gateway),
            metadata,
            listing,
        }
    }

    pub fn engine(&self) -> &IntegrityEngine {
        &self.engine
    }

    pub async fn connect(&self, session: &impl IdentitySource) -> Result<UserIdentity> {
        let identity = session.require_identity()?;
        self.users.connect(&identity).await
    }

    pub async fn eligibility(&self, session: &impl IdentitySource, token_address: Option<&str>) -> Result<Eligibility> {
        let identity = session.require_identity()?;
        self.users.eligibility(&identity, token_address).await
    }

    /// Looks up display metadata (best-effort) and submits the token.
    pub async fn submit(&self, session: &impl IdentitySource, address: &str) -> Result<TokenListing> {
        let identity = session.require_identity()?;
        let address = validate_token_address(address)?;

        let token = resolve_token_data(self.metadata.as_ref(), &address).await;
        self.engine.submit_token(&identity, token).await
    }

    pub async fn vote(&self, session: &impl IdentitySource, token_address: &str, vote_type: VoteType) -> Result<VoteRecord> {
        let identity = session.require_identity()?;
        self.engine.cast_vote(&identity, token_address.trim(), vote_type).await
    }

    pub async fn comment(&self, session: &impl IdentitySource, token_address: &str, content: &str) -> Result<Comment> {
        let identity = session.require_identity()?;
        self.comments.add_comment(&identity, token_address.trim(), content).await
    }

    pub async fn comments(&self, token_address: &str) -> Result<Vec<Comment>> {
        self.comments.list_comments(token_address.trim()).await
    }

    pub async fn token(&self, address: &str) -> Result<TokenListing> {
        self.engine
            .gateway()
            .get_token(address.trim())
            .await?
            .ok_or_else(|| Error::TokenNotFound(address.to_string()))
    }

    pub async fn list(&self, query: &ListingQuery) -> Result<ListingPage> {
        if let Some(search) = &query.search {
            validate_search(search)?;
        }
        let listings = self.engine.gateway().list_tokens().await?;
        Ok(query.apply(listings, self.listing.page_size, self.listing.max_page_size))
    }

    pub fn subscribe_tokens(&self) -> TokenListSubscription {
        self.engine.subscribe_token_changes()
    }

    pub async fn subscribe_token(&self, token_address: &str) -> Result<VoteCountSubscription> {
        self.engine.subscribe_single_token(token_address.trim()).await
    }

    pub async fn subscribe_comments(&self, token_address: &str) -> Result<CommentSubscription> {
        self.comments.subscribe(token_address.trim()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockMetadataSource, TokenMetadata};
    use crate::store::MemoryStore;
    use crate::wallet::WalletSession;
    use solana_sdk::pubkey::Pubkey;

    fn board_with(metadata: MockMetadataSource) -> (Arc<MemoryStore>, TokenBoard) {
        let store = Arc::new(MemoryStore::new());
        let board = TokenBoard::new(store.clone(), Arc::new(metadata), ListingConfig::default());
        (store, board)
    }

    #[tokio::test]
    async fn test_disconnected_wallet_never_reaches_metadata_or_store() {
        let mut metadata = MockMetadataSource::new();
        metadata.expect_fetch_metadata().times(0);
        let (store, board) = board_with(metadata);

        let err = board
            .submit(&WalletSession::disconnected(), &Pubkey::new_unique().to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotAuthenticated));
        assert_eq!(store.len(crate::store::Collection::Tokens).await, 0);
        assert_eq!(store.len(crate::store::Collection::Users).await, 0);
    }

    #[tokio::test]
    async fn test_submit_uses_fetched_metadata() {
        let mut metadata = MockMetadataSource::new();
        metadata.expect_fetch_metadata().times(1).returning(|_| {
            Ok(Some(TokenMetadata {
                name: "Foo".into(),
                symbol: "FOO".into(),
                image: "https://example.com/foo.png".into(),
            }))
        });
        let (_store, board) = board_with(metadata);
        let session = WalletSession::connected(Pubkey::new_unique().to_string());

        let listing = board.submit(&session, &Pubkey::new_unique().to_string()).await.unwrap();
        assert_eq!(listing.name, "Foo");
        assert_eq!(listing.counts().total(), 0);
    }

    #[tokio::test]
    async fn test_malformed_address_skips_metadata_lookup() {
        let mut metadata = MockMetadataSource::new();
        metadata.expect_fetch_metadata().times(0);
        let (_store, board) = board_with(metadata);
        let session = WalletSession::connected(Pubkey::new_unique().to_string());

        let err = board.submit(&session, "Tok111").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
