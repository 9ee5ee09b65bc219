use super::api;
use super::validation::RateLimiter;
use crate::error::{Error, Result};
use crate::services::{ListingQuery, TokenBoard};
use crate::wallet::{WalletSession, WALLET_HEADER};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};
use log::info;

const MAX_BODY_BYTES: u64 = 16 * 1024;

fn with_board(board: Arc<TokenBoard>) -> impl Filter<Extract = (Arc<TokenBoard>,), Error = Infallible> + Clone {
    warp::any().map(move || board.clone())
}

fn with_limiter(limiter: Arc<RateLimiter>) -> impl Filter<Extract = (Arc<RateLimiter>,), Error = Infallible> + Clone {
    warp::any().map(move || limiter.clone())
}

fn session() -> impl Filter<Extract = (WalletSession,), Error = Rejection> + Clone {
    warp::header::optional::<String>(WALLET_HEADER).map(WalletSession::from_header)
}

fn json_body<T: serde::de::DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// All HTTP and WebSocket routes, with rejections mapped to JSON error bodies.
pub fn routes(
    board: Arc<TokenBoard>,
    limiter: Arc<RateLimiter>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health").and(warp::get()).and_then(api::health_check);
    let metrics = warp::path!("metrics").and(warp::get()).and_then(api::get_metrics);

    let connect = warp::path!("api" / "users" / "connect")
        .and(warp::post())
        .and(session())
        .and(with_board(board.clone()))
        .and_then(api::connect_user);

    let eligibility = warp::path!("api" / "users" / "eligibility")
        .and(warp::get())
        .and(warp::query::<api::EligibilityQuery>())
        .and(session())
        .and(with_board(board.clone()))
        .and_then(api::get_eligibility);

    // Live routes come before `/api/tokens/{address}` so "live" is never read as an address.
    let live_tokens = warp::path!("api" / "tokens" / "live")
        .and(warp::ws())
        .and(with_board(board.clone()))
        .and_then(api::live_tokens);

    let live_token = warp::path!("api" / "tokens" / String / "live")
        .and(warp::ws())
        .and(with_board(board.clone()))
        .and_then(api::live_token);

    let live_comments = warp::path!("api" / "tokens" / String / "comments" / "live")
        .and(warp::ws())
        .and(with_board(board.clone()))
        .and_then(api::live_comments);

    let list_tokens = warp::path!("api" / "tokens")
        .and(warp::get())
        .and(warp::query::<ListingQuery>())
        .and(with_board(board.clone()))
        .and_then(api::list_tokens);

    let submit_token = warp::path!("api" / "tokens")
        .and(warp::post())
        .and(json_body())
        .and(session())
        .and(warp::addr::remote())
        .and(with_board(board.clone()))
        .and(with_limiter(limiter.clone()))
        .and_then(api::submit_token);

    let get_token = warp::path!("api" / "tokens" / String)
        .and(warp::get())
        .and(with_board(board.clone()))
        .and_then(api::get_token);

    let cast_vote = warp::path!("api" / "tokens" / String / "votes")
        .and(warp::post())
        .and(json_body())
        .and(session())
        .and(warp::addr::remote())
        .and(with_board(board.clone()))
        .and(with_limiter(limiter.clone()))
        .and_then(api::cast_vote);

    let list_comments = warp::path!("api" / "tokens" / String / "comments")
        .and(warp::get())
        .and(with_board(board.clone()))
        .and_then(api::list_comments);

    let add_comment = warp::path!("api" / "tokens" / String / "comments")
        .and(warp::post())
        .and(json_body())
        .and(session())
        .and(warp::addr::remote())
        .and(with_board(board))
        .and(with_limiter(limiter))
        .and_then(api::add_comment);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", WALLET_HEADER])
        .max_age(3600);

    health
        .or(metrics)
        .or(connect)
        .or(eligibility)
        .or(live_tokens)
        .or(live_token)
        .or(live_comments)
        .or(list_tokens)
        .or(submit_token)
        .or(get_token)
        .or(cast_vote)
        .or(list_comments)
        .or(add_comment)
        .with(cors)
        .with(warp::log("token_vote_board::http"))
        .recover(api::handle_rejection)
}

pub struct WebServer {
    board: Arc<TokenBoard>,
    limiter: Arc<RateLimiter>,
}

impl WebServer {
    pub fn new(board: Arc<TokenBoard>, limiter: Arc<RateLimiter>) -> Self {
        Self { board, limiter }
    }

    /// Serves until `shutdown` resolves. Open WebSocket streams are dropped with the server.
    pub async fn start(self, addr: SocketAddr, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let (bound, server) = warp::serve(routes(self.board, self.limiter))
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| Error::ConfigError(format!("cannot listen on {}: {}", addr, e)))?;
        info!("Listening on http://{}", bound);
        server.await;
        info!("Web server stopped");
        Ok(())
    }
}
