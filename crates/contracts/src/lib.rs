//! # Contracts
//!
//! Shared vocabulary of the sensor listener workspace: error kinds, channel
//! tags, camera parameters and sensor descriptions. Every other crate depends
//! on this one; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are microseconds since the Unix epoch (`i64`)
//! - A frame loaded from disk carries its own timestamp, which wins over the
//!   acquisition time of the composite frame it is added to

mod camera;
mod error;
mod frame_id;
mod sensor_context;
mod setup;

pub use camera::{CamParameters, Extrinsic, DISTORTION_COEFFS};
pub use error::{ListenerError, Result};
pub use frame_id::FrameId;
pub use sensor_context::{ScanningLidar, SensorContext, SensorInfo, SensorKind, SensorStatus};
pub use setup::{ConfigVersion, ListenerConfig, ListenerSetup, SensorConfig, SourceConfig};

/// Listener queue wait used when none is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
