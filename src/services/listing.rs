use crate::models::TokenListing;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    #[serde(alias = "mostBuy")]
    MostBullish,
    #[serde(alias = "mostBye")]
    MostBearish,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub items: Vec<TokenListing>,
    /// Matches before paging.
    pub total: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

fn matches(listing: &TokenListing, needle: &str) -> bool {
    listing.address.to_lowercase().contains(needle)
        || listing.name.to_lowercase().contains(needle)
        || listing.symbol.to_lowercase().contains(needle)
}

impl ListingQuery {
    /// Filters, sorts and pages a snapshot that is already ordered newest first.
    pub fn apply(&self, listings: Vec<TokenListing>, default_limit: usize, max_limit: usize) -> ListingPage {
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut filtered: Vec<TokenListing> = match &needle {
            Some(needle) => listings.into_iter().filter(|l| matches(l, needle)).collect(),
            None => listings,
        };

        // Stable sorts keep newest-first order among equal counts.
        match self.sort {
            SortOrder::Newest => {}
            SortOrder::MostBullish => filtered.sort_by(|a, b| b.buy_votes.cmp(&a.buy_votes)),
            SortOrder::MostBearish => filtered.sort_by(|a, b| b.bye_votes.cmp(&a.bye_votes)),
        }

        let total = filtered.len();
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        let items: Vec<TokenListing> = filtered.into_iter().skip(self.offset).take(limit).collect();
        let end = self.offset + items.len();
        let has_more = end < total;

        ListingPage {
            items,
            total,
            has_more,
            next_offset: if has_more { Some(end) } else { None },
        }
    }
}
