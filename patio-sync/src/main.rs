//! patio-sync binary — runs the occupancy-synchronization engine against a
//! configured parking backend, logging recognition outcomes as they arrive.

use anyhow::{bail, Result};
use clap::Parser;
use patio_common::config::resolve_backend;
use patio_sync::arbiter::RecognitionOutcome;
use patio_sync::Engine;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "patio-sync", about = "Parking occupancy synchronization engine")]
struct Args {
    /// Backend base URL (falls back to PATIO_API_URL, then the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token (falls back to PATIO_API_TOKEN, then the config file)
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting patio-sync v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = resolve_backend(args.api_url.as_deref(), args.token.as_deref())?;
    info!(backend = %config.base_url, "backend resolved");

    let (engine, mut outcomes) = Engine::new(&config)?;
    let mut fatal = engine.subscribe_fatal();

    let report = engine.load_snapshot().await;
    if report.auth_expired {
        bail!("credential rejected during snapshot load; sign in again");
    }
    for (collection, error) in &report.failed {
        warn!(?collection, %error, "collection unavailable until next refresh");
    }

    // Presentation surface of this headless client: structured log lines
    let presenter = tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            match outcome {
                RecognitionOutcome::Confirm { vehicle, free_spots } => info!(
                    plate = %vehicle.plate,
                    owner = vehicle.owner_name().unwrap_or("-"),
                    free_spots = free_spots.len(),
                    "entry confirmation required"
                ),
                RecognitionOutcome::AlreadyParked { plate, message } => {
                    info!(%plate, %message, "recognition rejected")
                }
                RecognitionOutcome::NotFound { plate, message } => {
                    info!(%plate, %message, "plate not found")
                }
            }
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down");
        }
        fatal_err = fatal.recv() => {
            if let Ok(e) = fatal_err {
                error!(error = %e, "session ended by the backend; sign in again");
            }
        }
    }
    engine.shutdown();
    presenter.abort();

    Ok(())
}
