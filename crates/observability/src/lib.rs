//! # Observability
//!
//! 日志与指标的进程级初始化，供 `sensor-listener` 命令行使用。
//!
//! 队列侧计数由 `listener` 直接写入 `metrics` facade；未安装 Prometheus
//! 导出器时这些调用不产生任何效果。
//!
//! ```ignore
//! observability::init(ObservabilityConfig {
//!     log_format: LogFormat::Pretty,
//!     ..Default::default()
//! })?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    describe_listener_metrics, record_frame_age_ms, record_frames_saved, AgeSummary,
    StreamMetricsAggregator, StreamSummary,
};

/// Output layout of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    /// One line per event
    Compact,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
    /// Serve Prometheus metrics on this port
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            default_log_level: "info".into(),
            metrics_port: None,
        }
    }
}

/// Install the global tracing subscriber and, if a port is set, the
/// Prometheus recorder. Fails when a subscriber is already installed.
pub fn init(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_log_level))
        .with_context(|| format!("Invalid log filter '{}'", config.default_log_level))?;

    let layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("Tracing subscriber already installed")?;

    if let Some(port) = config.metrics_port {
        serve_metrics(port)?;
    }
    tracing::debug!(format = ?config.log_format, port = ?config.metrics_port, "Observability ready");
    Ok(())
}

/// Expose the `metrics` facade over HTTP on `0.0.0.0:port`
pub fn serve_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Cannot serve metrics on port {port}"))?;
    describe_listener_metrics();
    tracing::info!(port, "Serving Prometheus metrics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_json_without_exporter() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.default_log_level, "info");
        assert!(config.metrics_port.is_none());
    }
}
