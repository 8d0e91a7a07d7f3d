//! chatstream - terminal client for the assistant service

mod commands;
mod repl;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chatstream_core::ChatConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chatstream", version, about = "Stream answers from the assistant service")]
struct Args {
    /// Base URL of the assistant API (overrides config and CHATSTREAM_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Config file (default: <config dir>/chatstream/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wait for whole replies instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ChatConfig::load(path)?,
        None => ChatConfig::load_default()?,
    };
    if args.config.is_some() {
        config.apply_env();
    }
    config.override_api_url(args.api_url.clone());
    if args.no_stream {
        config.streaming = false;
    }

    init_logging(&config, args.verbose);
    tracing::debug!(?config, "Starting chatstream");

    repl::run(&config).await.context("chat session failed")
}

/// Logs go to stderr so streamed text on stdout stays clean
fn init_logging(config: &ChatConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
