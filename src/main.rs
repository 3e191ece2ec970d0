use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use travelpack::VERSION;
use travelpack::cli::{Args, Session, build_orchestrator};
use travelpack::config::{LoggingConfig, TravelPackConfig};

/// Logs go to stderr; stdout carries only the conversation
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("travelpack={level},warn")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TravelPackConfig::load_from_path(args.config.clone())?;
    init_tracing(&config.logging, args.verbose);
    info!("Starting TravelPack v{}", VERSION);
    debug!("Arguments: {:?}", args);

    let orchestrator = build_orchestrator(&config, args.interpreter.as_deref())?;
    let session = Session::new(orchestrator, args.date);

    match args.one_shot_query() {
        Some(query) => session.run_once(&query).await,
        None => session.run_interactive().await?,
    }

    Ok(())
}
