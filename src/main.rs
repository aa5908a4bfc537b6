use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ratelimiter::{resolve, EnvSnapshot, RateLimiterOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve the rate limiter configuration and print it as JSON.
#[derive(Debug, Parser)]
#[command(name = "ratelimiter", version, about)]
struct Args {
    /// JSON file with caller configuration (ip, token, tokens, debug, disableEnvs)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Ignore RATE_LIMITER_* environment variables
    #[arg(long)]
    disable_env: bool,

    /// Turn on resolution tracing
    #[arg(long)]
    debug: bool,

    /// Pretty-print the resolved configuration
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file
    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ratelimiter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut options = match &args.config {
        Some(path) => RateLimiterOptions::from_json_file(path)?,
        None => RateLimiterOptions::new(),
    };
    if args.disable_env {
        options.disable_env = true;
    }
    if args.debug {
        options.debug = Some(true);
    }

    let config = match resolve(Some(options), &EnvSnapshot::from_process()) {
        Ok(config) => config,
        Err(e) if e.is_fatal() => {
            tracing::error!("Refusing to start: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        backend = %config.backend_kind,
        responder = %config.responder_kind,
        custom_tokens = config.custom_tokens.len(),
        "Rate limiter configuration resolved"
    );

    let snapshot = config.snapshot();
    let json = if args.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", json);

    Ok(())
}
