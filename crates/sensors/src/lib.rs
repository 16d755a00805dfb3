//! # Sensors
//!
//! Concrete sensor contexts and the frame producers that feed listeners.
//!
//! Responsibilities:
//! - Sensor descriptions (Flexx, RealSense, Cepton, Movia, generic)
//! - Replay of saved frames and of an externally written buffer directory
//! - Assembly of depth-camera captures into composite frames
//! - A synthetic callback-driven device for running without hardware
//! - Building listeners from a `ListenerSetup`
//!
//! ## Usage Example
//!
//! ```ignore
//! use config_loader::ConfigLoader;
//! use listener::NameRegistry;
//!
//! let setup = ConfigLoader::load_from_path(path)?;
//! let registry = NameRegistry::new();
//! let mut listeners = sensors::build_all(&registry, &setup)?;
//! ```

mod buffer;
mod depth;
mod factory;
mod files;
mod interfaces;
mod saved;
mod synthetic;

pub use buffer::BufferSource;
pub use depth::{scale_to_gray, DepthCapture};
pub use factory::{build_all, build_listener};
pub use files::{natural_cmp, sorted_files};
pub use interfaces::{
    from_config, FlexxSensor, GenericSensor, LidarMode, RealsenseSensor, ScanningLidarSensor,
};
pub use saved::SavedSource;
pub use synthetic::{plane_capture, SyntheticDevice};
