use super::gateway::PersistenceGateway;
use super::subscription::CommentSubscription;
use crate::error::{Error, Result};
use crate::models::Comment;
use crate::validation::validate_comment;
use crate::wallet::Identity;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use log::info;

const ID_BYTES: usize = 12;
const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct CommentService {
    gateway: PersistenceGateway,
    rng: SystemRandom,
}

impl CommentService {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self {
            gateway,
            rng: SystemRandom::new(),
        }
    }

    fn generate_id(&self) -> Result<String> {
        let mut bytes = [0u8; ID_BYTES];
        self.rng.fill(&mut bytes)?;
        Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub async fn add_comment(&self, identity: &Identity, token_address: &str, content: &str) -> Result<Comment> {
        let content = validate_comment(content)?;
        if self.gateway.get_token(token_address).await?.is_none() {
            return Err(Error::TokenNotFound(token_address.to_string()));
        }

        for _ in 0..MAX_ID_ATTEMPTS {
            let comment = Comment {
                id: self.generate_id()?,
                token_address: token_address.to_string(),
                author: identity.to_string(),
                content: content.clone(),
                timestamp: Utc::now(),
            };
            if self.gateway.create_comment(&comment).await? {
                info!("{} commented on {}", identity, token_address);
                return Ok(comment);
            }
        }
        Err(Error::InternalError("could not allocate a comment id".to_string()))
    }

    pub async fn list_comments(&self, token_address: &str) -> Result<Vec<Comment>> {
        self.gateway.list_comments(token_address).await
    }

    pub async fn subscribe(&self, token_address: &str) -> Result<CommentSubscription> {
        CommentSubscription::open(self.gateway.clone(), token_address).await
    }
}
