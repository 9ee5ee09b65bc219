use crate::error::{Error, Result};
use crate::solana::parse_pubkey;
use lazy_static::lazy_static;
use regex::Regex;
use log::warn;

pub const MAX_COMMENT_LENGTH: usize = 500;
pub const MAX_SEARCH_LENGTH: usize = 100;

lazy_static! {
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
}

/// Returns the canonical base58 form of a mint address.
pub fn validate_token_address(address: &str) -> Result<String> {
    if address.trim().is_empty() {
        return Err(Error::InvalidInput("Token address cannot be empty".to_string()));
    }
    Ok(parse_pubkey(address)?.to_string())
}

/// Trims and checks comment text.
pub fn validate_comment(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::ValidationError("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        warn!("Comment length {} exceeds maximum {}", content.chars().count(), MAX_COMMENT_LENGTH);
        return Err(Error::ValidationError(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    if CONTROL_CHARS.is_match(content) {
        return Err(Error::ValidationError("Comment contains invalid characters".to_string()));
    }
    Ok(content.to_string())
}

pub fn validate_search(query: &str) -> Result<()> {
    if query.len() > MAX_SEARCH_LENGTH {
        return Err(Error::ValidationError("Search query is too long".to_string()));
    }
    Ok(())
}
