//! Wallet-based identity.
//!
//! A connected wallet's public key is the user's identity. Nothing beyond the
//! presence of a well-formed address is verified.

use crate::error::{Error, Result};
use crate::solana::parse_pubkey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the connected wallet's public key.
pub const WALLET_HEADER: &str = "x-wallet-address";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Accepts a base58 wallet public key.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::NotAuthenticated);
        }
        let pubkey = parse_pubkey(address)
            .map_err(|_| Error::InvalidInput(format!("Invalid wallet address '{}'", address)))?;
        Ok(Self(pubkey.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait IdentitySource {
    fn current_address(&self) -> Option<&str>;

    fn is_connected(&self) -> bool {
        self.current_address().is_some()
    }

    /// Resolves the connected identity, or `NotAuthenticated` when disconnected.
    fn require_identity(&self) -> Result<Identity> {
        match self.current_address() {
            Some(address) => Identity::parse(address),
            None => Err(Error::NotAuthenticated),
        }
    }
}

/// Connection state of one client, as reported by its request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSession {
    address: Option<String>,
}

impl WalletSession {
    pub fn connected(address: impl Into<String>) -> Self {
        Self::from_header(Some(address.into()))
    }

    pub fn disconnected() -> Self {
        Self { address: None }
    }

    pub fn from_header(value: Option<String>) -> Self {
        let address = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { address }
    }
}

impl IdentitySource for WalletSession {
    fn current_address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}
