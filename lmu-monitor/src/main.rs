//! LMU Racing Telemetry
//!
//! Connects to the game's control-panel stream, aggregates per-driver
//! records, writes result files and serves a read-only API.

use anyhow::{Context, Result};
use clap::Parser;
use lmu_adapters::{DemoFeed, ResultFileFactory, RestVehicleSource};
use lmu_core::vehicles::NoVehicles;
use lmu_core::{Dispatcher, VehicleSource};
use lmu_monitor::config::{Cli, MonitorConfig, CONSOLE_REDRAW_INTERVAL, DEMO_TICK_INTERVAL};
use lmu_monitor::connection::{run_demo, ConnectionManager};
use lmu_monitor::{api, console, state};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = MonitorConfig::from(Cli::parse());
    init_tracing(&config)?;

    info!("Starting LMU Racing Telemetry {}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let (state, display, connection_tx) = state::AppState::new();

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("API listening on http://{}", config.listen);

    let vehicles: Box<dyn VehicleSource> = if config.demo {
        Box::new(NoVehicles)
    } else {
        Box::new(RestVehicleSource::new(config.vehicles_url.clone())?)
    };
    let mut dispatcher = Dispatcher::new(
        vehicles,
        Box::new(ResultFileFactory::new(config.output_dir.clone())),
        Box::new(display),
    );

    // Ingestion task: sole owner of the dispatcher and all live state
    let ingest = {
        let cancel = cancel.clone();
        let demo = config.demo;
        let ws_url = config.ws_url.clone();
        tokio::spawn(async move {
            if demo {
                run_demo(
                    DemoFeed::new(),
                    &mut dispatcher,
                    connection_tx,
                    DEMO_TICK_INTERVAL,
                    cancel,
                )
                .await;
            } else {
                ConnectionManager::new(ws_url, connection_tx)
                    .run(&mut dispatcher, cancel)
                    .await;
            }
        })
    };

    let display = config.console.then(|| {
        tokio::spawn(console::run(
            state.clone(),
            CONSOLE_REDRAW_INTERVAL,
            cancel.clone(),
        ))
    });

    let server = {
        let cancel = cancel.clone();
        let app = api::create_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
        })
    };

    // The console cancels on its quit keys
    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    if let Err(e) = ingest.await {
        error!("Ingestion task failed: {}", e);
    }
    if let Some(display) = display {
        if let Err(e) = display.await {
            error!("Console task failed: {}", e);
        }
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("API server error: {}", e),
        Err(e) => error!("API server task failed: {}", e),
    }

    info!("Stopped");
    Ok(())
}

/// Log to a file while the console owns the terminal, to stderr otherwise
fn init_tracing(config: &MonitorConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.console {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
