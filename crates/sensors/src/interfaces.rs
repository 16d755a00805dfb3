//! Sensor contexts - 各类传感器的静态描述
//!
//! 帧率、RGB 对齐、默认相机参数，以及扫描式激光雷达的滤波/点云调理能力。

use std::collections::HashSet;
use std::sync::Arc;

use nalgebra::{Matrix3, Vector3};

use contracts::{
    CamParameters, ListenerError, Result, ScanningLidar, SensorConfig, SensorContext, SensorKind,
    DISTORTION_COEFFS,
};

/// Flexx use-case index → framerate
const FLEXX_MODES: [(u32, u32); 5] = [(8, 5), (4, 10), (5, 15), (6, 20), (7, 30)];

const REALSENSE_WIDTHS: [u32; 7] = [1280, 848, 640, 480, 424, 256, 0];
const REALSENSE_HEIGHTS: [u32; 9] = [800, 720, 480, 360, 270, 240, 144, 100, 0];
const REALSENSE_FRAMERATES: [u32; 8] = [5, 6, 15, 30, 60, 90, 100, 0];

/// Per-mode optics of a scanning LiDAR
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarMode {
    pub focal: f32,
    pub width: f32,
    pub height: f32,
    pub filter_size: usize,
}

const fn mode(focal: f32, width: f32, height: f32, filter_size: usize) -> LidarMode {
    LidarMode {
        focal,
        width,
        height,
        filter_size,
    }
}

const CEPTON_MODES: [LidarMode; 5] = [
    mode(86.6, 100.0, 36.0, 1),
    mode(216.5, 250.0, 92.0, 3),
    mode(433.0, 500.0, 184.0, 5),
    mode(649.4, 750.0, 276.0, 7),
    mode(866.0, 1000.0, 368.0, 7),
];

const MOVIA_MODES: [LidarMode; 5] = [
    mode(86.6, 100.0, 58.0, 1),
    mode(216.5, 250.0, 146.0, 3),
    mode(433.0, 500.0, 294.0, 5),
    mode(649.4, 750.0, 440.0, 7),
    mode(866.0, 1000.0, 588.0, 7),
];

/// Time-of-flight camera; the use-case mode fixes the framerate
#[derive(Debug, Clone)]
pub struct FlexxSensor {
    mode: u32,
    framerate: u32,
}

impl FlexxSensor {
    pub fn new(mode: u32) -> Result<Self> {
        let framerate = FLEXX_MODES
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, fps)| *fps)
            .ok_or_else(|| {
                ListenerError::config_validation("sensor.mode", format!("unknown Flexx mode {mode}"))
            })?;
        Ok(Self { mode, framerate })
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }
}

impl SensorContext for FlexxSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Flexx
    }

    fn framerate(&self) -> u32 {
        self.framerate
    }

    fn rgb_mappable(&self) -> bool {
        false
    }
}

/// Depth + color camera with pixel-aligned streams
#[derive(Debug, Clone)]
pub struct RealsenseSensor {
    width: u32,
    height: u32,
    framerate: u32,
}

impl RealsenseSensor {
    /// Zero in any setting means "device default"
    pub fn new(width: u32, height: u32, framerate: u32) -> Result<Self> {
        let valid = REALSENSE_WIDTHS.contains(&width)
            && REALSENSE_HEIGHTS.contains(&height)
            && REALSENSE_FRAMERATES.contains(&framerate);
        if !valid {
            return Err(ListenerError::config_validation(
                "sensor",
                format!("invalid RealSense settings {width}x{height}@{framerate}"),
            ));
        }
        Ok(Self {
            width,
            height,
            framerate,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl SensorContext for RealsenseSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::RealSense
    }

    fn framerate(&self) -> u32 {
        self.framerate
    }

    fn rgb_mappable(&self) -> bool {
        true
    }
}

/// Scanning LiDAR (Cepton, Movia)
///
/// With processing enabled the grid is cropped vertically and the principal
/// point follows the cropped extent; the organizer then applies the mode's
/// floor-median filter.
#[derive(Debug, Clone)]
pub struct ScanningLidarSensor {
    kind: SensorKind,
    mode: LidarMode,
    framerate: u32,
    apply_processing: bool,
    crop_ratio: f32,
    aspect_ratio: f32,
}

impl ScanningLidarSensor {
    pub fn cepton(mode: u32, framerate: u32, apply_processing: bool) -> Result<Self> {
        Ok(Self {
            kind: SensorKind::Cepton,
            mode: lookup_mode(&CEPTON_MODES, mode)?,
            framerate,
            apply_processing,
            crop_ratio: 0.85,
            aspect_ratio: 1.5,
        })
    }

    pub fn movia(mode: u32, framerate: u32, apply_processing: bool) -> Result<Self> {
        Ok(Self {
            kind: SensorKind::Movia,
            mode: lookup_mode(&MOVIA_MODES, mode)?,
            framerate,
            apply_processing,
            crop_ratio: 1.0,
            aspect_ratio: 1.0,
        })
    }

    pub fn lidar_mode(&self) -> LidarMode {
        self.mode
    }

    pub fn applies_processing(&self) -> bool {
        self.apply_processing
    }
}

fn lookup_mode(table: &[LidarMode], mode: u32) -> Result<LidarMode> {
    table.get(mode as usize).copied().ok_or_else(|| {
        ListenerError::config_validation(
            "sensor.mode",
            format!("unknown lidar mode {mode}, expected 0..{}", table.len()),
        )
    })
}

impl SensorContext for ScanningLidarSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn framerate(&self) -> u32 {
        self.framerate
    }

    fn rgb_mappable(&self) -> bool {
        false
    }

    fn default_cam_params(&self) -> CamParameters {
        let LidarMode {
            focal,
            width,
            height,
            ..
        } = self.mode;
        let (cx, cy) = if self.apply_processing {
            (
                (height * self.crop_ratio * self.aspect_ratio / 2.0).floor(),
                (height * self.crop_ratio / 2.0).floor(),
            )
        } else {
            (width / 2.0, height / 2.0)
        };
        let intrinsic = Matrix3::new(focal, 0.0, cx, 0.0, focal, cy, 0.0, 0.0, 1.0);
        CamParameters::new(intrinsic, [1.0; DISTORTION_COEFFS])
    }

    fn as_scanning_lidar(&self) -> Option<&dyn ScanningLidar> {
        Some(self)
    }
}

impl ScanningLidar for ScanningLidarSensor {
    fn filter_size(&self) -> usize {
        if self.apply_processing {
            self.mode.filter_size
        } else {
            0
        }
    }

    fn condition_point_cloud(&self, points: Vec<Vector3<f32>>) -> Vec<Vector3<f32>> {
        match self.kind {
            SensorKind::Movia => condition_movia(points),
            _ => points,
        }
    }
}

/// Drop duplicates, rotate axes to camera convention and keep the usable range
fn condition_movia(points: Vec<Vector3<f32>>) -> Vec<Vector3<f32>> {
    let mut seen = HashSet::with_capacity(points.len());
    points
        .into_iter()
        .filter(|p| seen.insert([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]))
        .map(|p| Vector3::new(p.y, p.z, p.x))
        .filter(|p| 0.2 < p.z && p.z < 84.0)
        .collect()
}

/// Sensor with no model-specific behaviour
#[derive(Debug, Clone)]
pub struct GenericSensor {
    kind: SensorKind,
    framerate: u32,
    rgb_mappable: bool,
}

impl GenericSensor {
    pub fn new(kind: SensorKind, framerate: u32, rgb_mappable: bool) -> Self {
        Self {
            kind,
            framerate,
            rgb_mappable,
        }
    }
}

impl SensorContext for GenericSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn framerate(&self) -> u32 {
        self.framerate
    }

    fn rgb_mappable(&self) -> bool {
        self.rgb_mappable
    }
}

/// Build the sensor context described by `config`
pub fn from_config(config: &SensorConfig) -> Result<Arc<dyn SensorContext>> {
    Ok(match *config {
        SensorConfig::Flexx { mode } => Arc::new(FlexxSensor::new(mode)?),
        SensorConfig::Realsense {
            width,
            height,
            framerate,
        } => Arc::new(RealsenseSensor::new(width, height, framerate)?),
        SensorConfig::Cepton {
            mode,
            framerate,
            apply_processing,
        } => Arc::new(ScanningLidarSensor::cepton(mode, framerate, apply_processing)?),
        SensorConfig::Movia {
            mode,
            framerate,
            apply_processing,
        } => Arc::new(ScanningLidarSensor::movia(mode, framerate, apply_processing)?),
        SensorConfig::Generic {
            kind,
            framerate,
            rgb_mappable,
        } => Arc::new(GenericSensor::new(kind, framerate, rgb_mappable)),
    })
}
