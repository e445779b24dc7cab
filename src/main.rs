//! topic-radar: one-shot batch runner.
//! Runs a single batch over the configured platforms and prints the sealed
//! batch, per-platform leaders and cross-platform topics as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;
use tracing::info;

use topic_radar::config::{self, RadarConfig};
use topic_radar::ledger::{JsonFileUsageStore, UsageTracker};
use topic_radar::selection::{select_fresh, SelectionOptions};
use topic_radar::telemetry::{ensure_metrics_described, init_tracing};
use topic_radar::{BatchReport, Orchestrator};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "topic-radar", version, about = "Trending topic collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (TOML or JSON). Falls back to $RADAR_CONFIG_PATH, then config/radar.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch and print the result
    Run {
        /// Comma-separated platform ids, overrides `enabled_platforms`
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
        /// Run on a background worker and poll its progress
        #[arg(long)]
        spawn: bool,
        /// Print the Prometheus exposition after the run
        #[arg(long)]
        metrics: bool,
        /// Entries shown per platform
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Usage ledger file; when set, also list topics not used recently
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Summarise a usage ledger
    Stats {
        #[arg(long)]
        ledger: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            platforms,
            spawn,
            metrics,
            top,
            ledger,
        } => {
            let prometheus = if metrics { Some(install_metrics()?) } else { None };
            run(cfg, platforms, spawn, top, ledger.as_deref()).await?;
            if let Some(handle) = prometheus {
                println!("{}", handle.render());
            }
            Ok(())
        }
        Commands::Stats { ledger } => {
            let tracker = tracker_for(&ledger, &cfg);
            let stats = tracker
                .stats(Utc::now())
                .await
                .with_context(|| format!("reading ledger {}", ledger.display()))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RadarConfig> {
    match path {
        Some(p) => config::load_from(p).with_context(|| format!("loading config {}", p.display())),
        None => config::load_default().context("loading default config"),
    }
}

fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;
    ensure_metrics_described();
    Ok(handle)
}

fn tracker_for(path: &Path, cfg: &RadarConfig) -> UsageTracker {
    UsageTracker::new(Arc::new(JsonFileUsageStore::new(path)), cfg.dedup_window_days)
}

async fn run(
    mut cfg: RadarConfig,
    platforms: Vec<String>,
    spawn: bool,
    top: usize,
    ledger: Option<&Path>,
) -> anyhow::Result<()> {
    if !platforms.is_empty() {
        cfg.enabled_platforms = platforms;
    }
    let threshold = cfg.cross_platform_threshold;
    let orchestrator = Orchestrator::new(cfg.clone()).context("invalid configuration")?;

    let report = if spawn {
        run_spawned(&orchestrator).await?
    } else {
        orchestrator.run_batch().await
    };

    let agg = report.aggregator();
    let mut out = json!({
        "batch": report.batch,
        "top_by_platform": agg.top_by_platform(top),
        "cross_platform": agg.cross_platform(threshold),
        "summary": agg.summary(threshold),
    });
    if let Some(path) = ledger {
        let tracker = tracker_for(path, &cfg);
        let opts = SelectionOptions {
            limit: top,
            cross_platform_threshold: threshold,
            ..SelectionOptions::default()
        };
        let fresh = select_fresh(&tracker, &report.topics, &opts, Utc::now()).await;
        out["fresh"] = serde_json::to_value(fresh)?;
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn run_spawned(orchestrator: &Orchestrator) -> anyhow::Result<BatchReport> {
    let ticket = orchestrator.spawn_batch();
    info!(batch = %ticket.id, "batch spawned");
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let Some(snap) = orchestrator.progress(&ticket.id) else {
            break;
        };
        info!(
            batch = %snap.batch_id,
            done = snap.completed_platforms,
            total = snap.total_platforms,
            current = snap.current_platform.map(|p| p.as_str()).unwrap_or("-"),
            "progress"
        );
        if snap.is_terminal() {
            break;
        }
    }
    ticket.handle.await.context("batch worker failed")
}
