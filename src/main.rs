//! codex-pipeline HTTP entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args, load config
//!   3. Init logger
//!   4. Build the application context
//!   5. Serve until Ctrl-C

use std::sync::Arc;

use codex_pipeline::{app::AppContext, comms, config, error::AppError, logger};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.server.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        bind = %config.server.bind,
        effective_log_level = %effective_log_level,
        model_anthropic = %config.llm.anthropic.model,
        model_openai = %config.llm.openai.model,
        "config loaded"
    );
    if !config.keys.any() {
        info!("no provider keys configured, replies will come from the fallback pipeline");
    }

    let ctx = Arc::new(AppContext::from_config(&config)?);

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    comms::serve(&config.server.bind, ctx, shutdown).await
}

struct CliArgs {
    config_path: Option<String>,
    log_level: Option<&'static str>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: codex-pipeline [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv                    Increase logging verbosity (debug, trace)");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    let log_level = match verbosity {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { config_path, log_level }
}
