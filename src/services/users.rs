use super::gateway::PersistenceGateway;
use crate::error::Result;
use crate::models::UserIdentity;
use crate::wallet::Identity;
use chrono::Utc;
use serde::Serialize;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub can_submit: bool,
    pub can_vote: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct UserService {
    gateway: PersistenceGateway,
}

impl UserService {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self { gateway }
    }

    /// Registers a newly seen wallet and refreshes its last login.
    pub async fn connect(&self, identity: &Identity) -> Result<UserIdentity> {
        if self.gateway.ensure_user(identity.as_str()).await? {
            info!("New user connected: {}", identity);
        }
        self.gateway.touch_last_login(identity.as_str(), Utc::now()).await?;

        Ok(self
            .gateway
            .get_user(identity.as_str())
            .await?
            .unwrap_or_else(|| UserIdentity::new(identity.as_str())))
    }

    /// Advisory only; the integrity engine re-checks atomically on write.
    pub async fn can_submit(&self, identity: &Identity) -> Result<bool> {
        if self.gateway.get_submission_claim(identity.as_str()).await?.is_some() {
            return Ok(false);
        }
        Ok(!self
            .gateway
            .get_user(identity.as_str())
            .await?
            .map(|user| user.submitted_token)
            .unwrap_or(false))
    }

    pub async fn can_vote(&self, identity: &Identity, token_address: &str) -> Result<bool> {
        Ok(self
            .gateway
            .get_vote_record(token_address, identity.as_str())
            .await?
            .is_none())
    }

    pub async fn eligibility(&self, identity: &Identity, token_address: Option<&str>) -> Result<Eligibility> {
        let can_submit = self.can_submit(identity).await?;
        let can_vote = match token_address {
            Some(token) => Some(self.can_vote(identity, token).await?),
            None => None,
        };
        Ok(Eligibility { can_submit, can_vote })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use solana_sdk::pubkey::Pubkey;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connect_creates_then_refreshes() {
        let users = UserService::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let identity = Identity::parse(&Pubkey::new_unique().to_string()).unwrap();

        let first = users.connect(&identity).await.unwrap();
        assert_eq!(first.address, identity.as_str());
        assert!(!first.submitted_token);
        let first_login = first.last_login.unwrap();

        let second = users.connect(&identity).await.unwrap();
        assert!(second.last_login.unwrap() >= first_login);
        assert!(users.can_submit(&identity).await.unwrap());
    }
}
