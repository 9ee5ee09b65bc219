use crate::error::Result;
use crate::metrics;
use crate::models::TokenData;
use crate::solana::short_prefix;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use log::{info, warn};

#[cfg(test)]
use mockall::automock;

pub mod helius;
pub mod types;

pub use helius::HeliusClient;

pub const PLACEHOLDER_SYMBOL: &str = "???";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.png";
pub const DEFAULT_TOKEN_IMAGE: &str = "/default-token.png";

pub const IPFS_GATEWAYS: [&str; 4] = [
    "https://dweb.link/ipfs",
    "https://gateway.pinata.cloud/ipfs",
    "https://ipfs.io/ipfs",
    "https://cloudflare-ipfs.com/ipfs",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub image: String,
}

/// Chain metadata lookup. `Ok(None)` means the service knows nothing about the address.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, address: &str) -> Result<Option<TokenMetadata>>;
}

pub fn placeholder_name(address: &str) -> String {
    format!("Unknown Token ({}...)", short_prefix(address))
}

/// Best-effort display data for `address`. Lookup failures degrade to
/// placeholders and never fail the caller.
pub async fn resolve_token_data(source: &dyn MetadataSource, address: &str) -> TokenData {
    let address = address.trim();
    match source.fetch_metadata(address).await {
        Ok(Some(metadata)) => {
            info!("Resolved metadata for {}: {} ({})", address, metadata.name, metadata.symbol);
            TokenData {
                address: address.to_string(),
                name: metadata.name,
                symbol: metadata.symbol,
                image: metadata.image,
            }
        }
        outcome => {
            match outcome {
                Err(e) => warn!("Metadata lookup for {} failed, using placeholders: {}", address, e),
                _ => warn!("No metadata found for {}, using placeholders", address),
            }
            metrics::METADATA_FALLBACKS.inc();
            TokenData {
                address: address.to_string(),
                name: placeholder_name(address),
                symbol: PLACEHOLDER_SYMBOL.to_string(),
                image: PLACEHOLDER_IMAGE.to_string(),
            }
        }
    }
}

/// Rewrites IPFS references onto the primary gateway. Plain HTTP URLs and
/// local paths pass through unchanged.
pub fn normalize_image_url(image: &str) -> String {
    let image = image.trim();
    if image.is_empty() {
        return DEFAULT_TOKEN_IMAGE.to_string();
    }
    if !image.contains("ipfs") {
        return image.to_string();
    }

    let mut cid = image.strip_prefix("ipfs://").unwrap_or(image);
    for gateway in IPFS_GATEWAYS {
        if let Some(rest) = cid.strip_prefix(gateway) {
            cid = rest.trim_start_matches('/');
            break;
        }
    }
    if cid.starts_with("http") {
        // Some other gateway; leave it alone.
        return image.to_string();
    }
    format!("{}/{}", IPFS_GATEWAYS[0], cid)
}
