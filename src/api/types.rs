use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: "1",
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetAssetParams<'a> {
    pub id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// The subset of a DAS `getAsset` result used for display.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub content: Option<AssetContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetContent {
    #[serde(default)]
    pub metadata: Option<AssetMetadata>,
    #[serde(default)]
    pub links: Option<AssetLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetLinks {
    #[serde(default)]
    pub image: Option<String>,
}

impl Asset {
    pub fn name(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.metadata.as_ref())
            .and_then(|m| m.name.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn symbol(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.metadata.as_ref())
            .and_then(|m| m.symbol.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn image(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.links.as_ref())
            .and_then(|l| l.image.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}
