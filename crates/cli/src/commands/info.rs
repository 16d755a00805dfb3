//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{SensorInfo, SensorStatus};
use listener::{NameRegistry, SensorListener};

use super::{load_setup, select_listeners};
use crate::cli::InfoArgs;

/// Listener description for JSON output
#[derive(Serialize)]
struct ListenerInfo {
    name: String,
    sensor_kind: String,
    framerate: u32,
    resize_factor: f32,
    has_calibration: bool,
    has_own_thread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<CameraInfo>,
    sensor_info: SensorInfo,
    sensor_status: SensorStatus,
}

#[derive(Serialize)]
struct CameraInfo {
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading listener info");

    let setup = load_setup(&args.config)?;
    let configs = select_listeners(setup, args.listener.as_deref())?;

    let registry = NameRegistry::new();
    let mut listeners = Vec::with_capacity(configs.len());
    for config in &configs {
        let listener = sensors::build_listener(&registry, config)
            .with_context(|| format!("Failed to build listener '{}'", config.effective_name()))?;
        listeners.push(listener);
    }

    if args.json {
        let infos: Vec<ListenerInfo> = listeners.iter().map(describe).collect();
        let json = serde_json::to_string_pretty(&infos).context("Failed to serialize listener info")?;
        println!("{}", json);
    } else {
        for listener in &listeners {
            println!("=== {} ({}) ===", listener.name(), listener.sensor().kind());
            println!("{}", listener.info_and_status_report());
        }
    }

    Ok(())
}

fn describe(listener: &SensorListener) -> ListenerInfo {
    let capabilities = listener.capabilities();
    ListenerInfo {
        name: listener.name().to_string(),
        sensor_kind: listener.sensor().kind().to_string(),
        framerate: listener.framerate(),
        resize_factor: listener.resize_factor(),
        has_calibration: capabilities.has_calibration,
        has_own_thread: capabilities.has_own_thread,
        camera: listener.cam_params().ok().map(|p| CameraInfo {
            fx: p.fx(),
            fy: p.fy(),
            cx: p.cx(),
            cy: p.cy(),
        }),
        sensor_info: listener.sensor_info(),
        sensor_status: listener.sensor_status(),
    }
}
