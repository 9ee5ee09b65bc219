use super::types::{Asset, GetAssetParams, RpcRequest, RpcResponse};
use super::{normalize_image_url, MetadataSource, TokenMetadata, PLACEHOLDER_IMAGE, PLACEHOLDER_SYMBOL};
use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::solana::{rpc_endpoint, short_prefix};
use crate::utils::Cache;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use log::{debug, error, info, warn};

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const GET_ASSET: &str = "getAsset";

/// DAS `getAsset` client for a Helius-style Solana RPC endpoint.
#[derive(Debug, Clone)]
pub struct HeliusClient {
    client: Client,
    endpoint: String,
    cache: Cache<TokenMetadata>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HeliusClient {
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: rpc_endpoint(&config.rpc_url, config.api_key.as_deref()),
            cache: Cache::new(Duration::from_secs(config.cache_ttl_secs)),
            max_retries: MAX_RETRIES,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    async fn request_asset(&self, address: &str) -> Result<RpcResponse<Asset>> {
        let body = RpcRequest::new(GET_ASSET, GetAssetParams { id: address });
        let mut attempt = 0;

        loop {
            let outcome = self.client.post(&self.endpoint).json(&body).send().await;
            let retry_reason = match outcome {
                Ok(response) => match response.status() {
                    status if status.is_success() => {
                        return response.json::<RpcResponse<Asset>>().await.map_err(|e| {
                            error!("Failed to parse getAsset response: {}", e);
                            Error::ApiInvalidFormat(format!("Failed to parse getAsset response: {}", e))
                        });
                    }
                    StatusCode::TOO_MANY_REQUESTS => "rate limited".to_string(),
                    status if status.is_server_error() => format!("server error {}", status),
                    status => {
                        return Err(Error::ApiError(format!("getAsset failed with status: {}", status)));
                    }
                },
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => return Err(e.into()),
            };

            if attempt >= self.max_retries {
                return Err(Error::TransientNetworkFailure(format!(
                    "getAsset for {} gave up after {} attempts: {}",
                    address,
                    attempt + 1,
                    retry_reason
                )));
            }
            let backoff = self.retry_base_delay * 2u32.pow(attempt);
            warn!("getAsset {} ({}), retrying in {}ms", address, retry_reason, backoff.as_millis());
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// Maps a `getAsset` response to display metadata, filling missing fields.
pub fn parse_asset_response(address: &str, response: RpcResponse<Asset>) -> Result<Option<TokenMetadata>> {
    if let Some(err) = response.error {
        // -32602 and friends mean "unknown asset"; nothing to show.
        debug!("getAsset error for {}: {} ({})", address, err.message, err.code);
        return Ok(None);
    }
    let asset = match response.result {
        Some(asset) => asset,
        None => return Ok(None),
    };

    Ok(Some(TokenMetadata {
        name: asset
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Token {}", short_prefix(address))),
        symbol: asset.symbol().unwrap_or(PLACEHOLDER_SYMBOL).to_string(),
        image: asset
            .image()
            .map(normalize_image_url)
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
    }))
}

#[async_trait]
impl MetadataSource for HeliusClient {
    async fn fetch_metadata(&self, address: &str) -> Result<Option<TokenMetadata>> {
        if let Some(cached) = self.cache.get(address).await {
            debug!("Using cached metadata for {}", address);
            return Ok(Some(cached));
        }

        info!("Fetching metadata for {}", address);
        let response = self.request_asset(address).await?;
        let metadata = parse_asset_response(address, response)?;

        if let Some(found) = &metadata {
            self.cache.set(address.to_string(), found.clone()).await;
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINT: &str = "So11111111111111111111111111111111111111112";

    fn response(value: serde_json::Value) -> RpcResponse<Asset> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_asset() {
        let parsed = parse_asset_response(
            MINT,
            response(json!({
                "jsonrpc": "2.0",
                "id": "1",
                "result": {
                    "content": {
                        "metadata": {"name": "Wrapped SOL", "symbol": "SOL"},
                        "links": {"image": "ipfs://QmHash"}
                    }
                }
            })),
        )
        .unwrap()
        .unwrap();

        assert_eq!(parsed.name, "Wrapped SOL");
        assert_eq!(parsed.symbol, "SOL");
        assert_eq!(parsed.image, "https://dweb.link/ipfs/QmHash");
    }

    #[test]
    fn test_partial_asset_gets_field_defaults() {
        let parsed = parse_asset_response(MINT, response(json!({"result": {"content": {}}})))
            .unwrap()
            .unwrap();

        assert_eq!(parsed.name, "Token So11");
        assert_eq!(parsed.symbol, PLACEHOLDER_SYMBOL);
        assert_eq!(parsed.image, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_missing_result_is_none() {
        assert!(parse_asset_response(MINT, response(json!({"jsonrpc": "2.0"}))).unwrap().is_none());
        assert!(parse_asset_response(
            MINT,
            response(json!({"error": {"code": -32602, "message": "Asset not found"}}))
        )
        .unwrap()
        .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let config = MetadataConfig {
            rpc_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            timeout_secs: 1,
            cache_ttl_secs: 60,
        };
        let client = HeliusClient::new(&config)
            .unwrap()
            .with_retry_policy(1, Duration::from_millis(1));

        let err = client.fetch_metadata(MINT).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
