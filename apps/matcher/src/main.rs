mod classifier;
mod cli;
mod commands;
mod config;
mod coordinator;
mod editor;
mod errors;
mod models;
mod pages;
mod progress;
mod router;
mod transport;

use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::commands::run_command;
use crate::config::Config;
use crate::pages::Theme;
use crate::transport::http::HttpTransport;
use crate::transport::MatcherApi;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment first, then command-line overrides
    let config = Config::from_env()?.with_overrides(cli.api_url.clone(), cli.poll_interval_ms)?;

    // Logs go to stderr so page output on stdout stays clean
    let default_level = if cli.verbose { "debug" } else { config.rust_log.as_str() };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), default_level))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting matcher v{}", env!("CARGO_PKG_VERSION"));

    let api: Arc<dyn MatcherApi> = Arc::new(HttpTransport::new(&config.api_url)?);
    info!(api_url = %config.api_url, "Matcher transport initialized");

    let theme = if cli.no_color {
        Theme::plain()
    } else {
        Theme::new(true)
    };
    if let Err(e) = run_command(cli.command, &config, api, theme).await {
        error!("Command failed: {e}");
        process::exit(1);
    }

    Ok(())
}
