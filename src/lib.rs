pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod solana;
pub mod store;
pub mod utils;
pub mod validation;
pub mod wallet;
pub mod web;

pub use error::{Error, Result};
