//! ListenerFactory - 从 ListenerSetup 构建监听器
//!
//! 单传感器监听器一律带标定能力；帧来源决定采集方式（轮询 / 回调）。

use std::time::Duration;

use tracing::{info, instrument, warn};

use contracts::{ListenerConfig, ListenerSetup, Result, SourceConfig};
use listener::{NameRegistry, SensorListener};

use crate::buffer::BufferSource;
use crate::interfaces;
use crate::saved::SavedSource;
use crate::synthetic::SyntheticDevice;

/// Build one listener described by `config`
#[instrument(
    name = "listener_factory_build",
    skip(registry, config),
    fields(listener = %config.effective_name())
)]
pub fn build_listener(registry: &NameRegistry, config: &ListenerConfig) -> Result<SensorListener> {
    let sensor = interfaces::from_config(&config.sensor)?;

    let mut builder = SensorListener::builder(registry, sensor.clone())
        .name(config.effective_name())
        .timeout(Duration::from_millis(config.timeout_ms))
        .resize_factor(config.resize_factor)
        .calibrated(config.param_dir.clone());
    if let Some(identity) = &config.identity_name {
        builder = builder.identity_name(identity.clone());
    }

    builder = match &config.source {
        SourceConfig::Saved {
            data_dir,
            frame_ids,
            repeat,
        } => builder.poll(Box::new(SavedSource::open(data_dir, frame_ids, *repeat)?)),
        SourceConfig::Buffer { buffer_dir } => builder.poll(Box::new(BufferSource::new(buffer_dir))),
        SourceConfig::Synthetic { rows, cols } => builder.callback(Box::new(SyntheticDevice::new(
            *rows,
            *cols,
            sensor.framerate(),
        ))),
    };
    builder.build()
}

/// Build every listener of `setup`; the first failure drops those already built
pub fn build_all(registry: &NameRegistry, setup: &ListenerSetup) -> Result<Vec<SensorListener>> {
    let mut listeners = Vec::with_capacity(setup.listeners.len());
    for config in &setup.listeners {
        match build_listener(registry, config) {
            Ok(listener) => listeners.push(listener),
            Err(e) => {
                warn!(
                    listener = %config.effective_name(),
                    error = %e,
                    built = listeners.len(),
                    "Listener construction failed, releasing the others"
                );
                return Err(e);
            }
        }
    }
    info!(count = listeners.len(), "Listeners built");
    Ok(listeners)
}
