//! SensorContext - 传感器属性描述
//!
//! 帧加载与监听器构造所需的传感器元数据。扫描式激光雷达通过
//! [`ScanningLidar`] 能力接口额外提供滤波窗口与点云预处理。

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{CamParameters, ListenerError};

/// Key/value description of a connected device (model, serial, firmware, ...)
pub type SensorInfo = BTreeMap<String, String>;

/// Key/list description of a device's live state (supported modes, ...)
pub type SensorStatus = BTreeMap<String, Vec<String>>;

/// Sensor families known to the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Flexx,
    #[serde(rename = "realsense")]
    RealSense,
    Cepton,
    Ximea,
    Boson,
    Movia,
    Dummy,
}

impl SensorKind {
    /// Name used for a listener when none is given
    pub fn default_name(&self) -> &'static str {
        match self {
            SensorKind::Flexx => "FLEXX",
            SensorKind::RealSense => "RealSense",
            SensorKind::Cepton => "Cepton",
            SensorKind::Ximea => "Ximea",
            SensorKind::Boson => "Boson",
            SensorKind::Movia => "Movia",
            SensorKind::Dummy => "Dummy",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

impl FromStr for SensorKind {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flexx" => Ok(Self::Flexx),
            "realsense" => Ok(Self::RealSense),
            "cepton" => Ok(Self::Cepton),
            "ximea" => Ok(Self::Ximea),
            "boson" => Ok(Self::Boson),
            "movia" => Ok(Self::Movia),
            "dummy" => Ok(Self::Dummy),
            other => Err(ListenerError::invalid_argument(format!(
                "unknown sensor kind '{other}'"
            ))),
        }
    }
}

/// Static properties of a sensor needed to build and load frames.
///
/// Implementors that produce unorganized point clouds opt into the
/// [`ScanningLidar`] capability by overriding [`as_scanning_lidar`].
///
/// [`as_scanning_lidar`]: SensorContext::as_scanning_lidar
pub trait SensorContext: Send + Sync {
    /// Sensor family
    fn kind(&self) -> SensorKind;

    /// Nominal frames per second
    fn framerate(&self) -> u32;

    /// Whether RGB and point grid are pixel-aligned
    fn rgb_mappable(&self) -> bool;

    /// Parameters used until calibrated ones are loaded
    fn default_cam_params(&self) -> CamParameters {
        CamParameters::default()
    }

    /// Scanning LiDAR capability, if this sensor has one
    fn as_scanning_lidar(&self) -> Option<&dyn ScanningLidar> {
        None
    }
}

/// Capability of sensors whose raw output is an unorganized point set
pub trait ScanningLidar: Send + Sync {
    /// Odd floor-median window extent; 0 disables filtering
    fn filter_size(&self) -> usize;

    /// Sensor specific clean-up applied before organizing
    fn condition_point_cloud(&self, points: Vec<Vector3<f32>>) -> Vec<Vector3<f32>> {
        points
    }
}
