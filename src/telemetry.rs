// src/telemetry.rs
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ADAPTER_RUNS: &str = "radar_adapter_runs_total";
pub const TOPICS: &str = "radar_topics_total";
pub const HTTP_RETRIES: &str = "radar_http_retries_total";
pub const IDENTITY_ROTATIONS: &str = "radar_identity_rotations_total";
pub const STRATEGY_FALLBACKS: &str = "radar_strategy_fallbacks_total";
pub const RECORDS_SKIPPED: &str = "radar_records_skipped_total";
pub const LEDGER_ERRORS: &str = "radar_ledger_errors_total";
pub const BATCH_DURATION_MS: &str = "radar_batch_duration_ms";
pub const BATCH_LAST_RUN_TS: &str = "radar_batch_last_run_ts";

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(ADAPTER_RUNS, "Adapter invocations by platform and outcome.");
        describe_counter!(TOPICS, "Topics returned by adapters.");
        describe_counter!(HTTP_RETRIES, "Upstream requests retried after a failure.");
        describe_counter!(
            IDENTITY_ROTATIONS,
            "User-agent rotations triggered by 401/403."
        );
        describe_counter!(
            STRATEGY_FALLBACKS,
            "Adapter strategies that failed and fell through to the next one."
        );
        describe_counter!(RECORDS_SKIPPED, "Malformed upstream records skipped.");
        describe_counter!(
            LEDGER_ERRORS,
            "Dedup ledger lookups that failed and were treated as unused."
        );
        describe_histogram!(BATCH_DURATION_MS, "Batch wall time in milliseconds.");
        describe_gauge!(BATCH_LAST_RUN_TS, "Unix ts when a batch was last sealed.");
    });
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("topic_radar=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}
