//! Traceview terminal client
//!
//! Connects the replay engine to a live trace/control service and drives it
//! from an interactive command prompt.

mod console;
mod http;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use traceview_core::{EngineConfig, ReplayEngine, SessionOptions};
use traceview_env::TokioContext;

use crate::console::ConsoleCanvas;
use crate::http::HttpControlPlane;

/// Traceview trace playback client
#[derive(Parser, Debug)]
#[command(name = "traceview")]
#[command(about = "Replay a recorded drone trace from a remote service", long_about = None)]
struct Args {
    /// Base URL of the trace/control service
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// Drone whose trace to replay
    #[arg(short, long, default_value = "drone_1")]
    drone_id: String,

    /// Resample interval forwarded to the service
    #[arg(short, long, default_value = "1 second")]
    interval: String,

    /// Start playback immediately after the session loads
    #[arg(short, long)]
    play: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let ctx = TokioContext::shared();
    let api = Arc::new(
        HttpControlPlane::new(&args.base_url).context("building HTTP control plane")?,
    );
    let canvas = Arc::new(ConsoleCanvas::default());

    let session = SessionOptions {
        drone_id: args.drone_id.clone(),
        interval: args.interval.clone(),
    };
    info!(base_url = %args.base_url, drone_id = %args.drone_id, "connecting");

    let engine = ReplayEngine::start(ctx, api, canvas, session, EngineConfig::default())
        .await
        .context("session startup")?;

    if args.play {
        engine.play().await.context("initial play command")?;
    }

    println!("commands: play | pause | reset | status | info <n> | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("play") => {
                if let Err(e) = engine.play().await {
                    warn!(error = %e, "play failed");
                }
            }
            Some("pause") => {
                if let Err(e) = engine.pause().await {
                    warn!(error = %e, "pause failed");
                }
            }
            Some("reset") => {
                if let Err(e) = engine.reset().await {
                    warn!(error = %e, "reset failed");
                }
            }
            Some("status") => {
                println!(
                    "phase: {:?} | segment: {} | trail: {} points",
                    engine.phase(),
                    engine.segment_index(),
                    engine.trail_len()
                );
            }
            Some("info") => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(index) => {
                    if engine.open_waypoint_callout(index).is_none() {
                        println!("no waypoint {index}");
                    }
                }
                None => println!("usage: info <waypoint number>"),
            },
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unknown command: {other}"),
            None => {}
        }
    }

    info!("session closed");
    Ok(())
}
