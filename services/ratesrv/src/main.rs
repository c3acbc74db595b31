//! ratesrv - shipping rate resolution service

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ratesrv::{create_app_state, create_routes, preload, Config};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "RATESRV_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve,

    /// Validate configuration, load the sheet once and print cache metadata
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    common::logging::init_with_config(config.log_config())
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Check => check(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let bind_address = config.bind_address();
    let preload_on_start = config.rates.preload_on_start;
    info!(
        "Starting {} v{}",
        config.service.name,
        env!("CARGO_PKG_VERSION")
    );

    let state = create_app_state(config)?;
    if preload_on_start {
        preload(&state).await;
    }

    let app = create_routes(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(common::shutdown::wait_for_shutdown())
        .await
        .context("HTTP server error")?;

    info!("ratesrv stopped");
    Ok(())
}

async fn check(config: Config) -> Result<()> {
    let state = create_app_state(config)?;
    let meta = state
        .engine
        .load_from_sheet()
        .await
        .context("Failed to load shipping rates")?;

    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}
