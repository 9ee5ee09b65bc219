// Solana address helpers
use crate::error::{Error, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Parses a base58-encoded 32-byte public key (wallet or token mint).
pub fn parse_pubkey(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address.trim())
        .map_err(|e| Error::InvalidInput(format!("Invalid Solana address '{}': {}", address, e)))
}

pub fn is_valid_address(address: &str) -> bool {
    parse_pubkey(address).is_ok()
}

/// First four characters of an address, used for placeholder names.
pub fn short_prefix(address: &str) -> &str {
    match address.char_indices().nth(4) {
        Some((idx, _)) => &address[..idx],
        None => address,
    }
}

/// Appends the provider API key to an RPC endpoint, if one is configured.
pub fn rpc_endpoint(rpc_url: &str, api_key: Option<&str>) -> String {
    let base = rpc_url.trim_end_matches('/');
    match api_key.filter(|k| !k.is_empty()) {
        Some(key) => format!("{}/?api-key={}", base, key),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_mint() {
        let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        assert_eq!(parse_pubkey(usdc).unwrap().to_string(), usdc);
        assert!(!is_valid_address("EPjFWdd5"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_short_prefix() {
        assert_eq!(short_prefix("So11111111111111111111111111111111111111112"), "So11");
        assert_eq!(short_prefix("ab"), "ab");
    }

    #[test]
    fn test_rpc_endpoint() {
        assert_eq!(
            rpc_endpoint("https://mainnet.helius-rpc.com/", Some("k")),
            "https://mainnet.helius-rpc.com/?api-key=k"
        );
        assert_eq!(rpc_endpoint("http://localhost:8899", None), "http://localhost:8899");
    }
}
