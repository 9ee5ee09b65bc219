use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Display data for a token as resolved at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub image: String,
}

/// A submitted token with its vote counters.
///
/// Documents written by older clients may lack the counters or the address
/// field; both default here and the address is restored from the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenListing {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default)]
    pub buy_votes: u64,
    #[serde(default)]
    pub bye_votes: u64,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TokenListing {
    /// Fresh listing with zeroed counters. `created_at` is assigned by the store.
    pub fn new(data: TokenData, submitted_by: &str) -> Self {
        Self {
            address: data.address,
            name: data.name,
            symbol: data.symbol,
            image: data.image,
            submitted_by: submitted_by.to_string(),
            buy_votes: 0,
            bye_votes: 0,
            created_at: None,
        }
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            buy_votes: self.buy_votes,
            bye_votes: self.bye_votes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCounts {
    pub buy_votes: u64,
    pub bye_votes: u64,
}

impl VoteCounts {
    pub fn total(&self) -> u64 {
        self.buy_votes + self.bye_votes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_counters_default_to_zero() {
        let listing: TokenListing = serde_json::from_value(json!({
            "name": "Foo",
            "symbol": "FOO",
            "image": "/placeholder.png",
            "submittedBy": "someone"
        }))
        .unwrap();

        assert_eq!(listing.buy_votes, 0);
        assert_eq!(listing.bye_votes, 0);
        assert!(listing.created_at.is_none());
        assert!(listing.address.is_empty());
    }

    #[test]
    fn test_legacy_timestamp_field_is_accepted() {
        let listing: TokenListing = serde_json::from_value(json!({
            "address": "abc",
            "buyVotes": 3,
            "timestamp": "2024-01-01T12:00:00Z"
        }))
        .unwrap();

        assert_eq!(listing.buy_votes, 3);
        assert!(listing.created_at.is_some());
    }
}
