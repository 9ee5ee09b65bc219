use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{info, warn, LevelFilter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use token_vote_board::api::{HeliusClient, MetadataSource};
use token_vote_board::cli::Cli;
use token_vote_board::config::{Config, StoreBackend};
use token_vote_board::logging;
use token_vote_board::metrics;
use token_vote_board::services::TokenBoard;
use token_vote_board::store::{DocumentStore, MemoryStore, PostgresStore};
use token_vote_board::web::{RateLimiter, WebServer};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.debug { LevelFilter::Debug } else { LevelFilter::Info };
    logging::init(cli.log_file.as_deref(), level)?;

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from("config/config.toml"));
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    info!("Configuration loaded");

    metrics::init()?;

    let store: Arc<dyn DocumentStore> = match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(&config.database.url, config.database.max_connections)
                .await
                .context("connecting to postgres")?;
            info!("Connected to postgres document store");
            Arc::new(store)
        }
    };

    if config.metadata.api_key.is_none() {
        warn!("No Helius API key configured; token metadata lookups may be rejected");
    }
    let metadata: Arc<dyn MetadataSource> = Arc::new(HeliusClient::new(&config.metadata)?);

    let board = Arc::new(TokenBoard::new(store, metadata, config.listing.clone()));
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    let bind = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid listen address {}", bind))?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
    };

    WebServer::new(board, limiter).start(addr, shutdown).await?;
    Ok(())
}
