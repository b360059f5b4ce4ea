//! PRECONF FEED — live preconfirmation feed simulator
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the live feed and the dashboard, and logs feed stats until
//! Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

use preconf_feed::config;
use preconf_feed::dashboard::{self, DashboardState};
use preconf_feed::engine::LiveFeedEngine;
use preconf_feed::simulator::WhatIfSimulator;

const BANNER: &str = r#"
 ____  ____  _____ ____ ___  _   _ _____   _____ _____ _____ ____
|  _ \|  _ \| ____/ ___/ _ \| \ | |  ___| |  ___| ____| ____|  _ \
| |_) | |_) |  _|| |  | | | |  \| | |_    | |_  |  _| |  _| | | | |
|  __/|  _ <| |__| |__| |_| | |\  |  _|   |  _| | |___| |___| |_| |
|_|   |_| \_\_____\____\___/|_| \_|_|     |_|   |_____|_____|____/

  Live preconfirmation feed simulator
  v0.1.0
"#;

/// How often the stats line is logged.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path =
        std::env::var("PRECONF_FEED_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    println!("{BANNER}");
    info!(
        config = %config_path,
        capacity = cfg.feed.capacity,
        success_probability = cfg.feed.success_probability,
        seed = ?cfg.feed.seed,
        start_paused = cfg.feed.start_paused,
        "Preconf feed starting up"
    );

    // -- Engine ----------------------------------------------------------

    let engine = LiveFeedEngine::new(&cfg.feed).context("Invalid feed configuration")?;
    let _revisions = engine.subscribe(|snapshot| {
        trace!(
            revision = snapshot.revision,
            in_feed = snapshot.transactions.len(),
            "Feed snapshot published"
        );
    });
    engine.start().context("Failed to start live feed")?;

    // -- Dashboard -------------------------------------------------------

    let dashboard_task = if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            engine.clone(),
            WhatIfSimulator::new(&cfg.simulator, &cfg.feed),
        ));
        Some(dashboard::spawn_dashboard(state, cfg.dashboard.port).await?)
    } else {
        warn!("Dashboard disabled");
        None
    };

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(STATS_LOG_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Feed running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stats = engine.stats();
                info!(
                    total = stats.total,
                    pending = stats.pending,
                    finalized = stats.finalized,
                    failed = stats.failed,
                    success_rate = stats.success_rate,
                    avg_preconfirm_ms = ?stats.avg_preconfirm_latency_ms,
                    paused = engine.is_paused(),
                    "Feed stats"
                );
            }
            _ = &mut shutdown => {
                info!("Ctrl+C received. Shutting down.");
                break;
            }
        }
    }

    engine.stop();
    if let Some(task) = dashboard_task {
        task.abort();
    }
    info!("Preconf feed stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("preconf_feed=info"));

    let json_logging = std::env::var("PRECONF_FEED_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
