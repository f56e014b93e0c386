//! signal-desk: travel-safety cache proxy and composite risk scores.
//!
//! Single-binary Tokio application that:
//! 1. Serves the advisory snapshot through the tiered cache
//! 2. Keeps the cache warm in the background
//! 3. Recomputes composite scores on a timer and on demand
//! 4. Exposes scores and their demand view over HTTP

mod config;
mod demand;
mod server;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::{error, info, warn};

use common::Error;
use server::{run_refresh, AppState};

/// Travel-safety cache proxy and risk scoring service
#[derive(Parser)]
#[command(name = "signal-desk", about = "Travel-safety cache proxy and risk scores")]
struct Cli {
    /// Fetch one advisory snapshot, print it as JSON, and exit.
    #[arg(long)]
    once: bool,

    /// Path to a TOML config file (defaults to ./config.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "signal_desk=info,cache_proxy=info,advisory_client=info,scoring=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("signal-desk starting up...");

    // Load configuration.
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Advisory upstream: {}", cfg.upstream.advisory_url);
    info!(
        "Cache: topic={} redis={} ttl={}s/{}s",
        cfg.cache.topic_key,
        cfg.cache.redis_url.is_some(),
        cfg.cache.distributed_ttl_secs,
        cfg.cache.memory_ttl_secs
    );

    let state = match AppState::from_config(&cfg).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    // ── One-shot mode ────────────────────────────────────────────────
    if cli.once {
        match state.advisories.get_snapshot().await {
            Ok((snapshot, origin)) => {
                info!("Snapshot served via {} ({} entries)", origin.as_str(), snapshot.count);
                match serde_json::to_string_pretty(snapshot.as_ref()) {
                    Ok(body) => println!("{}", body),
                    Err(e) => {
                        error!("Failed to encode snapshot: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            Err(e @ Error::NoDataAvailable(_)) => {
                error!("{}", e);
                std::process::exit(1);
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let listener = match TcpListener::bind(&cfg.server.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", cfg.server.bind_addr, e);
            std::process::exit(1);
        }
    };

    // Task 1: HTTP server
    let app = server::router(state.clone());
    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    // Task 2: Advisory cache warm-up
    let warm_state = state.clone();
    let warm_every = cfg.timing.advisory_refresh_secs;
    let warm_handle = tokio::spawn(async move {
        loop {
            if let Err(e) = warm_state.advisories.get_snapshot().await {
                warn!("Advisory warm-up failed: {}", e);
            }
            if warm_every == 0 {
                info!("Advisory refresh loop disabled after initial warm-up");
                std::future::pending::<()>().await;
            }
            sleep(Duration::from_secs(warm_every)).await;
        }
    });

    // Task 3: Score re-trigger
    let score_state = state.clone();
    let score_every = cfg.timing.score_refresh_secs;
    let score_handle = tokio::spawn(async move {
        if score_every == 0 {
            info!("Score refresh loop disabled");
            std::future::pending::<()>().await;
        }
        loop {
            sleep(Duration::from_secs(score_every)).await;
            let scores = run_refresh(&score_state, false).await;
            if !scores.is_empty() {
                info!("Score refresh produced {} entries", scores.len());
            }
        }
    });

    // Task 4: Heartbeat
    let hb_state = state.clone();
    let hb_every = Duration::from_secs(cfg.timing.heartbeat_secs);
    let hb_topic = cfg.cache.topic_key.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(hb_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let tally = hb_state.counters.tally(&hb_topic);
            let (ready, scored) = {
                let engine = hb_state.engine.read().await;
                (engine.is_ready(), engine.scores().len())
            };
            info!(
                "HEARTBEAT: lookups={} dist_hit={} mem_hit={} miss={} stale={} error={} focal_ready={} scores={}",
                tally.total(),
                tally.distributed_hit,
                tally.memory_hit,
                tally.miss,
                tally.stale,
                tally.error,
                ready,
                scored
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("signal-desk listening on {}. Press Ctrl+C to stop.", cfg.server.bind_addr);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = server_handle => {
            error!("HTTP server exited: {:?}", r);
        }
        r = warm_handle => {
            error!("Advisory refresh task exited: {:?}", r);
        }
        r = score_handle => {
            error!("Score refresh task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    info!("signal-desk shut down.");
}
