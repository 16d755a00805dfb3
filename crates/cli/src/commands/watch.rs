//! `watch` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use frames::now_micros;
use listener::{NameRegistry, SensorListener};
use observability::StreamMetricsAggregator;

use super::{load_setup, select_listeners};
use crate::cli::WatchArgs;
use crate::error::CliError;

/// Execute the `watch` command
pub fn run_watch(args: &WatchArgs) -> Result<()> {
    info!(config = %args.config.display(), frames = args.frames, "Watching listener");

    let setup = load_setup(&args.config)?;
    let configs = select_listeners(setup, args.listener.as_deref())?;
    let config = configs
        .first()
        .context("Configuration defines no listener")?;

    let registry = NameRegistry::new();
    let mut listener = sensors::build_listener(&registry, config)
        .with_context(|| format!("Failed to build listener '{}'", config.effective_name()))?;

    listener.start_stream()?;
    let watched = watch(&listener, args.frames);
    if let Err(e) = listener.stop_stream() {
        warn!(listener = %listener.name(), error = %e, "Stopping stream failed");
    }
    let aggregator = watched?;

    println!("Listener: {}", listener.name());
    print!("{}", aggregator.summary());
    Ok(())
}

/// Consume up to `frames` latest frames, stopping early once the source runs dry
fn watch(listener: &SensorListener, frames: u32) -> Result<StreamMetricsAggregator, CliError> {
    let mut aggregator = StreamMetricsAggregator::new();
    let mut dropped_before = listener.metrics_snapshot().frames_dropped;

    for _ in 0..frames {
        match listener.get_latest_frame() {
            Ok(frame) => {
                let dropped_now = listener.metrics_snapshot().frames_dropped;
                let age_ms = (now_micros() - frame.timestamp()).max(0) as f64 / 1000.0;
                aggregator.record_frame(age_ms, dropped_now - dropped_before);
                observability::record_frame_age_ms(listener.name(), age_ms);
                dropped_before = dropped_now;
            }
            Err(e) if e.is_recoverable() => {
                aggregator.record_timeout();
                if !listener.is_streaming() {
                    info!(listener = %listener.name(), "Source exhausted");
                    break;
                }
            }
            Err(e) => return Err(CliError::stream(listener.name(), e.to_string())),
        }
    }
    Ok(aggregator)
}
