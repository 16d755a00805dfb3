//! Typed frames: one tensor plus the camera context it was captured with.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use tracing::{debug, instrument};

use crate::codec::{npy, ply, raster};
use crate::organizer;
use crate::tensor::{Element, Tensor};
use contracts::{CamParameters, Extrinsic, FrameId, ListenerError, Result, SensorContext};

/// Camera parameters and extrinsic shared by every frame of one sensor
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub cam_params: Arc<CamParameters>,
    pub extrinsic: Arc<Extrinsic>,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            cam_params: Arc::new(CamParameters::default()),
            extrinsic: Arc::new(Extrinsic::identity()),
        }
    }
}

impl FrameContext {
    pub fn new(cam_params: Arc<CamParameters>, extrinsic: Arc<Extrinsic>) -> Self {
        Self {
            cam_params,
            extrinsic,
        }
    }
}

/// A dense tensor of one element type with its camera context
#[derive(Debug, Clone)]
pub struct TypedFrame<T> {
    tensor: Tensor<T>,
    context: FrameContext,
    loaded_timestamp: Option<i64>,
}

impl<T: Element> TypedFrame<T> {
    pub fn new(tensor: Tensor<T>, context: FrameContext) -> Self {
        Self {
            tensor,
            context,
            loaded_timestamp: None,
        }
    }

    /// `(0, 0, 0)` placeholder awaiting data
    pub fn unallocated(context: FrameContext) -> Self {
        Self::new(Tensor::empty(), context)
    }

    /// Mark the frame as read from storage at `timestamp_us`
    pub fn with_loaded_timestamp(mut self, timestamp_us: i64) -> Self {
        self.loaded_timestamp = Some(timestamp_us);
        self
    }

    pub fn rows(&self) -> usize {
        self.tensor.rows()
    }

    pub fn cols(&self) -> usize {
        self.tensor.cols()
    }

    pub fn channels(&self) -> usize {
        self.tensor.channels()
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.tensor.dims()
    }

    pub fn tensor(&self) -> &Tensor<T> {
        &self.tensor
    }

    pub fn tensor_mut(&mut self) -> &mut Tensor<T> {
        &mut self.tensor
    }

    pub fn into_tensor(self) -> Tensor<T> {
        self.tensor
    }

    /// Element at `(row, col, channel)`
    pub fn element(&self, row: usize, col: usize, channel: usize) -> Option<T> {
        self.tensor.get(row, col, channel)
    }

    pub fn context(&self) -> &FrameContext {
        &self.context
    }

    pub fn cam_params(&self) -> &Arc<CamParameters> {
        &self.context.cam_params
    }

    pub fn extrinsic(&self) -> &Arc<Extrinsic> {
        &self.context.extrinsic
    }

    /// Microsecond epoch of the file this frame was read from
    pub fn loaded_timestamp(&self) -> Option<i64> {
        self.loaded_timestamp
    }

    /// Nearest-neighbour resample both spatial axes by `factor`
    pub fn resize(&mut self, factor: f32) -> Result<()> {
        if factor != 1.0 {
            self.tensor = self.tensor.resized_nearest(factor)?;
        }
        Ok(())
    }

    /// Single channel mask, true where any channel is non-zero
    pub fn nonzero_mask(&self) -> TypedFrame<bool> {
        TypedFrame::new(self.tensor.nonzero_mask(), self.context.clone())
    }
}

/// Closed set of frame variants, one per [`FrameId`]
#[derive(Debug, Clone)]
pub enum DataFrame {
    PointGrid(TypedFrame<f32>),
    Grayscale(TypedFrame<u8>),
    Rgb(TypedFrame<u8>),
    Temperature(TypedFrame<f32>),
    Mask(TypedFrame<bool>),
}

/// Run the same expression against whichever typed frame a `DataFrame` holds
macro_rules! with_frame {
    ($value:expr, $frame:ident => $body:expr) => {
        match $value {
            DataFrame::PointGrid($frame) => $body,
            DataFrame::Grayscale($frame) => $body,
            DataFrame::Rgb($frame) => $body,
            DataFrame::Temperature($frame) => $body,
            DataFrame::Mask($frame) => $body,
        }
    };
}

fn check_channels<T: Element>(id: FrameId, frame: &TypedFrame<T>) -> Result<()> {
    if frame.tensor.is_unallocated() || frame.channels() == id.channels() {
        Ok(())
    } else {
        Err(ListenerError::invalid_argument(format!(
            "{id} frames carry {} channels, got {}",
            id.channels(),
            frame.channels()
        )))
    }
}

impl DataFrame {
    pub fn point_grid(frame: TypedFrame<f32>) -> Result<Self> {
        check_channels(FrameId::PointCloudGrid, &frame)?;
        Ok(Self::PointGrid(frame))
    }

    pub fn grayscale(frame: TypedFrame<u8>) -> Result<Self> {
        check_channels(FrameId::GrayscaleImage, &frame)?;
        Ok(Self::Grayscale(frame))
    }

    pub fn rgb(frame: TypedFrame<u8>) -> Result<Self> {
        check_channels(FrameId::RgbImage, &frame)?;
        Ok(Self::Rgb(frame))
    }

    pub fn temperature(frame: TypedFrame<f32>) -> Result<Self> {
        check_channels(FrameId::TemperatureGrid, &frame)?;
        Ok(Self::Temperature(frame))
    }

    pub fn mask(frame: TypedFrame<bool>) -> Result<Self> {
        check_channels(FrameId::PointCloudMask, &frame)?;
        Ok(Self::Mask(frame))
    }

    /// Fails when the wrapped tensor's channel count does not match the tag
    pub fn validate(&self) -> Result<()> {
        let id = self.frame_id();
        with_frame!(self, f => check_channels(id, f))
    }

    /// Channel tag of this variant
    pub fn frame_id(&self) -> FrameId {
        match self {
            DataFrame::PointGrid(_) => FrameId::PointCloudGrid,
            DataFrame::Grayscale(_) => FrameId::GrayscaleImage,
            DataFrame::Rgb(_) => FrameId::RgbImage,
            DataFrame::Temperature(_) => FrameId::TemperatureGrid,
            DataFrame::Mask(_) => FrameId::PointCloudMask,
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        with_frame!(self, f => f.dims())
    }

    pub fn context(&self) -> &FrameContext {
        with_frame!(self, f => f.context())
    }

    pub fn loaded_timestamp(&self) -> Option<i64> {
        with_frame!(self, f => f.loaded_timestamp())
    }

    pub fn resize(&mut self, factor: f32) -> Result<()> {
        with_frame!(self, f => f.resize(factor))
    }

    pub fn nonzero_mask(&self) -> TypedFrame<bool> {
        with_frame!(self, f => f.nonzero_mask())
    }

    pub fn as_point_grid(&self) -> Option<&TypedFrame<f32>> {
        match self {
            DataFrame::PointGrid(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_grayscale(&self) -> Option<&TypedFrame<u8>> {
        match self {
            DataFrame::Grayscale(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_rgb(&self) -> Option<&TypedFrame<u8>> {
        match self {
            DataFrame::Rgb(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_temperature(&self) -> Option<&TypedFrame<f32>> {
        match self {
            DataFrame::Temperature(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_mask(&self) -> Option<&TypedFrame<bool>> {
        match self {
            DataFrame::Mask(f) => Some(f),
            _ => None,
        }
    }

    /// Persist to `stem` plus the extension of this variant's encoding.
    ///
    /// Returns the path written.
    pub fn save(&self, stem: &Path) -> Result<PathBuf> {
        let (r, c, ch) = self.dims();
        let path = stem.with_extension(match self {
            DataFrame::Grayscale(_) | DataFrame::Rgb(_) => "png",
            _ => "npy",
        });
        match self {
            DataFrame::PointGrid(f) => npy::write(&path, &[r, c, ch], f.tensor.as_slice())?,
            DataFrame::Temperature(f) => npy::write(&path, &[r, c], f.tensor.as_slice())?,
            DataFrame::Mask(f) => npy::write(&path, &[r, c], f.tensor.as_slice())?,
            DataFrame::Grayscale(f) | DataFrame::Rgb(f) => raster::save(&path, &f.tensor)?,
        }
        Ok(path)
    }

    /// Read a frame of kind `frame_id` from `path`.
    ///
    /// Point grids dispatch on the extension: `.npy` is read directly, `.ply`
    /// is organized using the sensor's scanning LiDAR capability.
    #[instrument(name = "frame_load", skip_all, fields(frame_id = %frame_id, path = %path.display()))]
    pub fn load(
        frame_id: FrameId,
        path: &Path,
        sensor: &dyn SensorContext,
        context: FrameContext,
    ) -> Result<Self> {
        let timestamp = file_timestamp_us(path)?;
        let frame = match frame_id {
            FrameId::PointCloudGrid => {
                Self::PointGrid(load_point_grid(path, sensor, context)?.with_loaded_timestamp(timestamp))
            }
            FrameId::GrayscaleImage => Self::Grayscale(
                TypedFrame::new(raster::load(path, 1)?, context).with_loaded_timestamp(timestamp),
            ),
            FrameId::RgbImage => Self::Rgb(
                TypedFrame::new(raster::load(path, 3)?, context).with_loaded_timestamp(timestamp),
            ),
            FrameId::TemperatureGrid => Self::Temperature(
                TypedFrame::new(load_plane::<f32>(path)?, context).with_loaded_timestamp(timestamp),
            ),
            FrameId::PointCloudMask => Self::Mask(
                TypedFrame::new(load_plane::<bool>(path)?, context).with_loaded_timestamp(timestamp),
            ),
        };
        debug!(dims = ?frame.dims(), "Loaded frame");
        Ok(frame)
    }
}

fn file_timestamp_us(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp_micros())
}

fn format_err(path: &Path, message: impl Into<String>) -> ListenerError {
    ListenerError::format(path.display().to_string(), message)
}

fn load_point_grid(
    path: &Path,
    sensor: &dyn SensorContext,
    context: FrameContext,
) -> Result<TypedFrame<f32>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("npy") => {
            let array = npy::read::<f32>(path)?;
            let tensor = match array.shape.as_slice() {
                &[rows, cols, 3] => Tensor::from_vec(rows, cols, 3, array.data)?,
                shape => {
                    return Err(format_err(
                        path,
                        format!("point grid must have shape (rows, cols, 3), got {shape:?}"),
                    ))
                }
            };
            Ok(TypedFrame::new(tensor, context))
        }
        Some("ply") => {
            let lidar = sensor.as_scanning_lidar().ok_or_else(|| {
                format_err(
                    path,
                    format!("organizing a point cloud requires a scanning LiDAR context, {} has none", sensor.kind()),
                )
            })?;
            let points: Vec<Vector3<f32>> = lidar.condition_point_cloud(ply::read_points(path)?);
            let tensor = organizer::organize(&points, &context.cam_params.intrinsic, lidar.filter_size());
            Ok(TypedFrame::new(tensor, context))
        }
        Some("npz") => Err(format_err(path, "compressed npz point grids are not supported")),
        _ => Err(format_err(path, "invalid file format for point cloud data")),
    }
}

/// Single channel array stored as `(rows, cols)` or `(rows, cols, 1)`
fn load_plane<T: Element + npy::NpyElement>(path: &Path) -> Result<Tensor<T>> {
    let array = npy::read::<T>(path)?;
    match array.shape.as_slice() {
        &[rows, cols] | &[rows, cols, 1] => Tensor::from_vec(rows, cols, 1, array.data),
        shape => Err(format_err(
            path,
            format!("expected a (rows, cols) array, got shape {shape:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ScanningLidar, SensorKind};
    use tempfile::tempdir;

    struct Camera;

    impl SensorContext for Camera {
        fn kind(&self) -> SensorKind {
            SensorKind::Dummy
        }

        fn framerate(&self) -> u32 {
            10
        }

        fn rgb_mappable(&self) -> bool {
            true
        }
    }

    struct Lidar;

    impl ScanningLidar for Lidar {
        fn filter_size(&self) -> usize {
            0
        }
    }

    impl SensorContext for Lidar {
        fn kind(&self) -> SensorKind {
            SensorKind::Cepton
        }

        fn framerate(&self) -> u32 {
            10
        }

        fn rgb_mappable(&self) -> bool {
            false
        }

        fn as_scanning_lidar(&self) -> Option<&dyn ScanningLidar> {
            Some(self)
        }
    }

    fn lidar_context() -> FrameContext {
        FrameContext::new(
            Arc::new(CamParameters::pinhole(10.0, 10.0, 5.0, 5.0)),
            Arc::new(Extrinsic::identity()),
        )
    }

    #[test]
    fn test_constructor_checks_channels() {
        let ctx = FrameContext::default();
        let two = TypedFrame::new(Tensor::<f32>::zeros(2, 2, 2), ctx.clone());
        assert!(DataFrame::point_grid(two).is_err());
        let placeholder = TypedFrame::<f32>::unallocated(ctx.clone());
        assert!(DataFrame::point_grid(placeholder).is_ok());
        let gray = TypedFrame::new(Tensor::<u8>::zeros(2, 2, 1), ctx);
        assert_eq!(DataFrame::grayscale(gray).unwrap().frame_id(), FrameId::GrayscaleImage);
    }

    #[test]
    fn test_save_and_load_each_variant() {
        let dir = tempdir().unwrap();
        let ctx = FrameContext::default();
        let frames = vec![
            DataFrame::point_grid(TypedFrame::new(
                Tensor::from_vec(1, 2, 3, vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]).unwrap(),
                ctx.clone(),
            ))
            .unwrap(),
            DataFrame::temperature(TypedFrame::new(
                Tensor::from_vec(1, 2, 1, vec![36.5, 20.0]).unwrap(),
                ctx.clone(),
            ))
            .unwrap(),
            DataFrame::mask(TypedFrame::new(
                Tensor::from_vec(1, 2, 1, vec![true, false]).unwrap(),
                ctx.clone(),
            ))
            .unwrap(),
            DataFrame::rgb(TypedFrame::new(
                Tensor::from_vec(1, 2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap(),
                ctx.clone(),
            ))
            .unwrap(),
        ];

        for frame in frames {
            let path = frame.save(&dir.path().join(frame.frame_id().as_str())).unwrap();
            let loaded = DataFrame::load(frame.frame_id(), &path, &Camera, ctx.clone()).unwrap();
            assert_eq!(loaded.frame_id(), frame.frame_id());
            assert_eq!(loaded.dims(), frame.dims());
            assert!(loaded.loaded_timestamp().is_some());
            assert!(frame.loaded_timestamp().is_none());
        }
    }

    #[test]
    fn test_ply_requires_scanning_lidar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.ply");
        ply::write_points(&path, &[Vector3::new(0.0, 0.0, 1.0)]).unwrap();

        let err = DataFrame::load(FrameId::PointCloudGrid, &path, &Camera, lidar_context());
        assert!(matches!(err, Err(ListenerError::Format { .. })));

        let frame = DataFrame::load(FrameId::PointCloudGrid, &path, &Lidar, lidar_context()).unwrap();
        let grid = frame.as_point_grid().unwrap();
        assert_eq!(grid.dims(), (10, 10, 3));
        assert_eq!(grid.element(5, 5, 2), Some(1.0));
    }

    #[test]
    fn test_unsupported_point_grid_encodings() {
        let dir = tempdir().unwrap();
        for name in ["grid.npz", "grid.txt"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"").unwrap();
            let err = DataFrame::load(FrameId::PointCloudGrid, &path, &Lidar, lidar_context());
            assert!(matches!(err, Err(ListenerError::Format { .. })), "{name}");
        }
    }

    #[test]
    fn test_resize_keeps_context() {
        let ctx = lidar_context();
        let mut frame = DataFrame::grayscale(TypedFrame::new(Tensor::<u8>::zeros(4, 6, 1), ctx.clone())).unwrap();
        frame.resize(0.5).unwrap();
        assert_eq!(frame.dims(), (2, 3, 1));
        assert!(Arc::ptr_eq(&frame.context().cam_params, &ctx.cam_params));
    }
}
