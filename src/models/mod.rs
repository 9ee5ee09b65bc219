use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub mod token;

pub use token::{TokenData, TokenListing, VoteCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    #[serde(alias = "buy")]
    Bullish,
    #[serde(alias = "bye")]
    Bearish,
}

impl VoteType {
    /// Counter field on the token listing that this vote increments.
    pub fn counter_field(&self) -> &'static str {
        match self {
            VoteType::Bullish => "buyVotes",
            VoteType::Bearish => "byeVotes",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteType::Bullish => write!(f, "bullish"),
            VoteType::Bearish => write!(f, "bearish"),
        }
    }
}

impl FromStr for VoteType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" | "buy" => Ok(VoteType::Bullish),
            "bearish" | "bye" => Ok(VoteType::Bearish),
            other => Err(crate::error::Error::InvalidInput(format!(
                "Invalid vote type '{}'. Use \"bullish\" or \"bearish\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(default)]
    pub address: String,
    #[serde(default, alias = "tokenSubmitted")]
    pub submitted_token: bool,
    #[serde(default)]
    pub submissions: HashMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub votes: HashMap<String, VoteType>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserIdentity {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }
}

/// Proof that an identity has used its single submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionClaim {
    pub identity: String,
    pub token_address: String,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub token_address: String,
    #[serde(alias = "walletAddress")]
    pub voter: String,
    pub vote_type: VoteType,
    pub timestamp: DateTime<Utc>,
}

impl VoteRecord {
    /// Composite document key; one record may exist per key.
    pub fn key_for(token_address: &str, voter: &str) -> String {
        format!("{}_{}", token_address, voter)
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.token_address, &self.voter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    pub token_address: String,
    #[serde(alias = "walletAddress")]
    pub author: String,
    #[serde(alias = "comment")]
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
