//! Musegen - interactive steering client for realtime music generation
//!
//! Connects to the generation service, plays the stream on the default
//! audio device, and steers generation from prompt lines typed on stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use musegen_common::config::{load_settings, resolve_api_key};
use musegen_player::audio::{DeviceSinkOpener, OutputFormat};
use musegen_player::session::{GenerationConfig, LiveMusicConnector};
use musegen_player::{ControllerConfig, SessionController};

/// Command-line arguments for musegen
#[derive(Parser, Debug)]
#[command(name = "musegen")]
#[command(about = "Interactive steering client for realtime music generation")]
#[command(version)]
struct Args {
    /// API credential (falls back to GEMINI_API_KEY, then the config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Path to the config file (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Realtime music model identifier
    #[arg(long)]
    model: Option<String>,

    /// Output device name (default: system default device)
    #[arg(long)]
    device: Option<String>,

    /// Beats per minute for generation
    #[arg(long)]
    bpm: Option<u32>,

    /// Sampling temperature for generation
    #[arg(long)]
    temperature: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; the default filter keeps third-party noise
    // (audio backends, websocket internals) off the interactive console
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musegen_player=info,musegen_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut settings =
        load_settings(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(model) = args.model {
        settings.model = model;
    }
    if let Some(device) = args.device {
        settings.output_device = Some(device);
    }
    if let Some(bpm) = args.bpm {
        settings.bpm = bpm;
    }
    if let Some(temperature) = args.temperature {
        settings.temperature = temperature;
    }

    let api_key = resolve_api_key(args.api_key.as_deref(), &settings);

    info!("Starting musegen with model {}", settings.model);

    let config = ControllerConfig {
        api_key,
        model: settings.model.clone(),
        generation: GenerationConfig {
            bpm: settings.bpm,
            temperature: settings.temperature,
        },
        format: OutputFormat::session_default(),
    };

    let controller = SessionController::new(
        config,
        Arc::new(LiveMusicConnector::new()),
        Arc::new(DeviceSinkOpener {
            device_name: settings.output_device.clone(),
            buffer_ms: settings.buffer_ms,
        }),
    );

    // Status display: print every observed transition
    let mut status_rx = controller.subscribe_status();
    tokio::spawn(async move {
        loop {
            println!("status: {}", *status_rx.borrow_and_update());
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    });

    controller.connect().await;

    println!("Type a prompt to steer the music, /pause to pause, /quit to exit.");

    tokio::select! {
        _ = prompt_loop(&controller) => {}
        _ = shutdown_signal() => {}
    }

    controller.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Read prompt lines from stdin and forward them to the controller
async fn prompt_loop(controller: &SessionController) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/q" => break,
            "/pause" => controller.pause().await,
            prompt => controller.submit_prompt(prompt).await,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
