use super::validation::RateLimiter;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::VoteType;
use crate::services::{CommentSubscription, ListingQuery, TokenBoard, TokenListSubscription, VoteCountSubscription};
use crate::wallet::{IdentitySource, WalletSession};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::ws::{Message, WebSocket, Ws};
use warp::{Rejection, Reply};
use log::{debug, error, info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(alias = "vote_type")]
    pub vote_type: VoteType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EligibilityQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveMessage<'a, T: Serialize> {
    Tokens { data: &'a T },
    Votes {
        #[serde(rename = "tokenAddress")]
        token_address: &'a str,
        data: &'a T,
    },
    Comments {
        #[serde(rename = "tokenAddress")]
        token_address: &'a str,
        data: &'a T,
    },
    Error { error: &'static str, message: String },
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
        Error::AlreadySubmitted | Error::DuplicateToken(_) | Error::AlreadyVoted => StatusCode::CONFLICT,
        Error::TokenNotFound(_) | Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) | Error::ValidationError(_) => StatusCode::BAD_REQUEST,
        Error::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::TransientNetworkFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_reply(err: &Error) -> WithStatus<Json> {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": err.kind(),
            "message": err.user_message(),
        })),
        status,
    )
}

fn reply<T: Serialize>(result: Result<T>, success: StatusCode) -> WithStatus<Json> {
    match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), success),
        Err(e) => error_reply(&e),
    }
}

async fn within_limit(limiter: &RateLimiter, session: &WalletSession, remote: Option<SocketAddr>) -> Result<()> {
    let key = match (session.current_address(), remote) {
        (Some(address), _) => address.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "anonymous".to_string(),
    };
    if limiter.check(&key).await {
        Ok(())
    } else {
        Err(Error::RateLimitExceeded(key))
    }
}

pub async fn health_check() -> std::result::Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn get_metrics() -> std::result::Result<Box<dyn Reply>, Infallible> {
    match metrics::gather() {
        Ok(body) => Ok(Box::new(body)),
        Err(e) => Ok(Box::new(error_reply(&Error::from(e)))),
    }
}

pub async fn connect_user(
    session: WalletSession,
    board: Arc<TokenBoard>,
) -> std::result::Result<impl Reply, Infallible> {
    Ok(reply(board.connect(&session).await, StatusCode::OK))
}

pub async fn get_eligibility(
    query: EligibilityQuery,
    session: WalletSession,
    board: Arc<TokenBoard>,
) -> std::result::Result<impl Reply, Infallible> {
    Ok(reply(
        board.eligibility(&session, query.token.as_deref()).await,
        StatusCode::OK,
    ))
}

pub async fn list_tokens(
    query: ListingQuery,
    board: Arc<TokenBoard>,
) -> std::result::Result<impl Reply, Infallible> {
    Ok(reply(board.list(&query).await, StatusCode::OK))
}

pub async fn get_token(address: String, board: Arc<TokenBoard>) -> std::result::Result<impl Reply, Infallible> {
    Ok(reply(board.token(&address).await, StatusCode::OK))
}

pub async fn submit_token(
    request: SubmitRequest,
    session: WalletSession,
    remote: Option<SocketAddr>,
    board: Arc<TokenBoard>,
    limiter: Arc<RateLimiter>,
) -> std::result::Result<impl Reply, Infallible> {
    let result = match within_limit(&limiter, &session, remote).await {
        Ok(()) => board.submit(&session, &request.address).await,
        Err(e) => Err(e),
    };
    if let Ok(listing) = &result {
        info!("Listing created for {}", listing.address);
    }
    Ok(reply(result, StatusCode::CREATED))
}

pub async fn cast_vote(
    address: String,
    request: VoteRequest,
    session: WalletSession,
    remote: Option<SocketAddr>,
    board: Arc<TokenBoard>,
    limiter: Arc<RateLimiter>,
) -> std::result::Result<impl Reply, Infallible> {
    let result = match within_limit(&limiter, &session, remote).await {
        Ok(()) => board.vote(&session, &address, request.vote_type).await,
        Err(e) => Err(e),
    };
    Ok(reply(result, StatusCode::CREATED))
}

pub async fn list_comments(address: String, board: Arc<TokenBoard>) -> std::result::Result<impl Reply, Infallible> {
    Ok(reply(board.comments(&address).await, StatusCode::OK))
}

pub async fn add_comment(
    address: String,
    request: CommentRequest,
    session: WalletSession,
    remote: Option<SocketAddr>,
    board: Arc<TokenBoard>,
    limiter: Arc<RateLimiter>,
) -> std::result::Result<impl Reply, Infallible> {
    let result = match within_limit(&limiter, &session, remote).await {
        Ok(()) => board.comment(&session, &address, &request.content).await,
        Err(e) => Err(e),
    };
    Ok(reply(result, StatusCode::CREATED))
}

pub async fn live_tokens(ws: Ws, board: Arc<TokenBoard>) -> std::result::Result<impl Reply, Infallible> {
    let subscription = board.subscribe_tokens();
    Ok(ws.on_upgrade(move |socket| stream_live(socket, subscription)))
}

pub async fn live_token(
    address: String,
    ws: Ws,
    board: Arc<TokenBoard>,
) -> std::result::Result<Box<dyn Reply>, Infallible> {
    match board.subscribe_token(&address).await {
        Ok(subscription) => Ok(Box::new(ws.on_upgrade(move |socket| stream_live(socket, subscription)))),
        Err(e) => Ok(Box::new(error_reply(&e))),
    }
}

pub async fn live_comments(
    address: String,
    ws: Ws,
    board: Arc<TokenBoard>,
) -> std::result::Result<Box<dyn Reply>, Infallible> {
    match board.subscribe_comments(&address).await {
        Ok(subscription) => Ok(Box::new(ws.on_upgrade(move |socket| stream_live(socket, subscription)))),
        Err(e) => Ok(Box::new(error_reply(&e))),
    }
}

fn encode_live<T: Serialize>(message: &LiveMessage<'_, T>) -> Message {
    match serde_json::to_string(message) {
        Ok(text) => Message::text(text),
        Err(e) => {
            error!("Failed to encode live message: {}", e);
            Message::text(
                serde_json::json!({
                    "type": "error",
                    "error": "InternalError",
                    "message": "Something went wrong. Please try again.",
                })
                .to_string(),
            )
        }
    }
}

fn live_error(err: &Error) -> Message {
    encode_live::<()>(&LiveMessage::Error {
        error: err.kind(),
        message: err.user_message(),
    })
}

/// A subscription that can be pushed over a WebSocket.
#[async_trait]
trait LiveFeed: Send {
    fn label(&self) -> String;

    /// Next frame to push, or `None` once the feed is closed. Must be cancel-safe.
    async fn next_frame(&mut self) -> Option<Message>;
}

#[async_trait]
impl LiveFeed for TokenListSubscription {
    fn label(&self) -> String {
        "token list".to_string()
    }

    async fn next_frame(&mut self) -> Option<Message> {
        match self.next().await {
            Ok(Some(listings)) => Some(encode_live(&LiveMessage::Tokens { data: &listings })),
            Ok(None) => None,
            Err(e) => {
                warn!("Token snapshot failed: {}", e);
                Some(live_error(&e))
            }
        }
    }
}

#[async_trait]
impl LiveFeed for VoteCountSubscription {
    fn label(&self) -> String {
        format!("votes of {}", self.token_address())
    }

    async fn next_frame(&mut self) -> Option<Message> {
        match self.next().await {
            Ok(Some(counts)) => Some(encode_live(&LiveMessage::Votes {
                token_address: self.token_address(),
                data: &counts,
            })),
            Ok(None) => None,
            Err(e) => {
                warn!("Vote count snapshot for {} failed: {}", self.token_address(), e);
                Some(live_error(&e))
            }
        }
    }
}

#[async_trait]
impl LiveFeed for CommentSubscription {
    fn label(&self) -> String {
        format!("comments of {}", self.token_address())
    }

    async fn next_frame(&mut self) -> Option<Message> {
        match self.next().await {
            Ok(Some(comments)) => Some(encode_live(&LiveMessage::Comments {
                token_address: self.token_address(),
                data: &comments,
            })),
            Ok(None) => None,
            Err(e) => {
                warn!("Comment snapshot for {} failed: {}", self.token_address(), e);
                Some(live_error(&e))
            }
        }
    }
}

/// Returns `false` once the client has gone away.
fn client_still_open(incoming: Option<std::result::Result<Message, warp::Error>>) -> bool {
    match incoming {
        Some(Ok(message)) => !message.is_close(),
        Some(Err(e)) => {
            debug!("WebSocket receive error: {}", e);
            false
        }
        None => false,
    }
}

/// Pushes `feed` until either side closes. Client frames race the feed, so a
/// pending frame may be dropped mid-read and is then produced on the next turn.
async fn stream_live<F: LiveFeed>(socket: WebSocket, mut feed: F) {
    let (mut tx, mut rx) = socket.split();
    let label = feed.label();
    info!("Live stream opened: {}", label);

    loop {
        tokio::select! {
            frame = feed.next_frame() => {
                match frame {
                    Some(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = rx.next() => {
                if !client_still_open(incoming) {
                    break;
                }
            }
        }
    }

    // Dropping the feed unsubscribes.
    drop(feed);
    info!("Live stream closed: {}", label);
}

pub async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (status, kind, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "NotFound", "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "InvalidInput", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "InvalidInput", e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "InvalidInput", "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", "Internal error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": kind,
            "message": message,
        })),
        status,
    ))
}
