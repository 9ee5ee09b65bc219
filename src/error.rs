use std::result::Result as StdResult;
use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Wallet must be connected")]
    NotAuthenticated,
    #[error("You have already submitted a token")]
    AlreadySubmitted,
    #[error("This token has already been submitted: {0}")]
    DuplicateToken(String),
    #[error("You have already voted on this token")]
    AlreadyVoted,
    #[error("Token not found: {0}")]
    TokenNotFound(String),
    #[error("Vote on {token_address} was recorded but the {field} counter was not updated: {reason}")]
    PartialWriteAnomaly {
        token_address: String,
        field: String,
        reason: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Network failure: {0}")]
    TransientNetworkFailure(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Document {collection}/{key} not found")]
    NotFound { collection: String, key: String },
    #[error("Document {collection}/{key} is malformed: {reason}")]
    CorruptDocument {
        collection: String,
        key: String,
        reason: String,
    },
    #[error("API error: {0}")]
    ApiError(String),
    #[error("API invalid format: {0}")]
    ApiInvalidFormat(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl Error {
    /// Stable machine-readable name of the failure, used in API bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotAuthenticated => "NotAuthenticated",
            Error::AlreadySubmitted => "AlreadySubmitted",
            Error::DuplicateToken(_) => "DuplicateToken",
            Error::AlreadyVoted => "AlreadyVoted",
            Error::TokenNotFound(_) => "TokenNotFound",
            Error::PartialWriteAnomaly { .. } => "PartialWriteAnomaly",
            Error::InvalidInput(_) => "InvalidInput",
            Error::ValidationError(_) => "ValidationError",
            Error::TransientNetworkFailure(_) => "TransientNetworkFailure",
            Error::RateLimitExceeded(_) => "RateLimitExceeded",
            Error::NotFound { .. } => "NotFound",
            Error::CorruptDocument { .. } => "CorruptDocument",
            Error::ApiError(_) => "ApiError",
            Error::ApiInvalidFormat(_) => "ApiInvalidFormat",
            Error::ConfigError(_) => "ConfigError",
            Error::InternalError(_) => "InternalError",
            Error::IoError(_) => "IoError",
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientNetworkFailure(_) | Error::RateLimitExceeded(_) | Error::IoError(_)
        )
    }

    /// Message safe to show to an end user. Infrastructure details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotAuthenticated => "Please connect your wallet to continue".to_string(),
            Error::AlreadySubmitted => "You have already submitted a token".to_string(),
            Error::DuplicateToken(_) => "This token has already been submitted".to_string(),
            Error::AlreadyVoted => "You have already voted on this token".to_string(),
            Error::TokenNotFound(_) => "Token not found".to_string(),
            Error::InvalidInput(msg) | Error::ValidationError(msg) => msg.clone(),
            Error::RateLimitExceeded(_) => "Too many requests, please slow down".to_string(),
            Error::PartialWriteAnomaly { .. } => {
                "Your vote was recorded but the counter may lag behind".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ApiInvalidFormat(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::TransientNetworkFailure(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::TransientNetworkFailure(format!("database: {}", err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl From<ring::error::Unspecified> for Error {
    fn from(err: ring::error::Unspecified) -> Self {
        Error::InternalError(format!("random source failure: {:?}", err))
    }
}

pub type Result<T> = StdResult<T, Error>;
