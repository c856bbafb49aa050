pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
mod logging;
pub mod model;
pub mod model_gateway;
pub mod providers;
pub mod repl;
pub mod weather;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use tracing::info;

use cli::Cli;
use config::Config;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();
    info!(version = env!("CARGO_PKG_VERSION"), "starting weatherbot");

    let cli = Cli::parse();
    let cfg = Config::from_env();
    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;

    cli::dispatch(cli, &cfg, client).await
}
