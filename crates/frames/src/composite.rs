//! CompositeFrame - 单次采集周期的多通道帧集合
//!
//! 每个 [`FrameId`] 至多一帧；加入点云网格时自动派生有效掩码。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::frame::{DataFrame, TypedFrame};
use crate::point_cloud::PointSink;
use contracts::{FrameId, ListenerError, Result};

/// Current time as microseconds since the Unix epoch
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Timestamped bundle of co-registered frames from one acquisition
#[derive(Debug, Clone)]
pub struct CompositeFrame {
    timestamp: i64,
    rgb_mappable: bool,
    frames: BTreeMap<FrameId, DataFrame>,
}

impl CompositeFrame {
    /// Empty composite frame acquired at `timestamp` (µs epoch)
    pub fn new(timestamp: i64, rgb_mappable: bool) -> Self {
        Self {
            timestamp,
            rgb_mappable,
            frames: BTreeMap::new(),
        }
    }

    /// Empty composite frame stamped with the current time
    pub fn now(rgb_mappable: bool) -> Self {
        Self::new(now_micros(), rgb_mappable)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn rgb_mappable(&self) -> bool {
        self.rgb_mappable
    }

    /// Insert `frame` under its own tag, replacing any previous one.
    ///
    /// A loaded timestamp on the frame replaces the composite's timestamp.
    /// Adding a point grid while no mask is present also inserts the grid's
    /// non-zero mask. Fails, leaving the composite untouched, when the frame's
    /// channel count does not fit its tag.
    pub fn add_frame(&mut self, frame: DataFrame) -> Result<()> {
        frame.validate()?;
        let frame_id = frame.frame_id();
        let derived_mask = match &frame {
            DataFrame::PointGrid(grid) if !self.has(FrameId::PointCloudMask) => {
                Some(DataFrame::Mask(grid.nonzero_mask()))
            }
            _ => None,
        };

        if let Some(ts) = frame.loaded_timestamp() {
            self.timestamp = ts;
        }
        self.frames.insert(frame_id, frame);
        if let Some(mask) = derived_mask {
            self.frames.insert(FrameId::PointCloudMask, mask);
        }
        Ok(())
    }

    /// Builder-style [`add_frame`](Self::add_frame)
    pub fn with_frame(mut self, frame: DataFrame) -> Result<Self> {
        self.add_frame(frame)?;
        Ok(self)
    }

    pub fn has(&self, frame_id: FrameId) -> bool {
        self.frames.contains_key(&frame_id)
    }

    /// Frame stored under `frame_id`
    pub fn get_frame(&self, frame_id: FrameId) -> Result<&DataFrame> {
        self.frames
            .get(&frame_id)
            .ok_or(ListenerError::FrameNotFound { frame_id })
    }

    pub fn get_frame_mut(&mut self, frame_id: FrameId) -> Result<&mut DataFrame> {
        self.frames
            .get_mut(&frame_id)
            .ok_or(ListenerError::FrameNotFound { frame_id })
    }

    /// Tags present, in storage order
    pub fn frame_ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn point_grid(&self) -> Result<&TypedFrame<f32>> {
        typed(self, FrameId::PointCloudGrid, DataFrame::as_point_grid)
    }

    pub fn grayscale(&self) -> Result<&TypedFrame<u8>> {
        typed(self, FrameId::GrayscaleImage, DataFrame::as_grayscale)
    }

    pub fn rgb(&self) -> Result<&TypedFrame<u8>> {
        typed(self, FrameId::RgbImage, DataFrame::as_rgb)
    }

    pub fn temperature(&self) -> Result<&TypedFrame<f32>> {
        typed(self, FrameId::TemperatureGrid, DataFrame::as_temperature)
    }

    pub fn mask(&self) -> Result<&TypedFrame<bool>> {
        typed(self, FrameId::PointCloudMask, DataFrame::as_mask)
    }

    /// Resize every frame except the validity mask.
    ///
    /// The mask keeps its original resolution; a factor of 1.0 does nothing.
    pub fn resize_all(&mut self, factor: f32) -> Result<()> {
        if factor == 1.0 {
            return Ok(());
        }
        for (frame_id, frame) in self.frames.iter_mut() {
            if *frame_id == FrameId::PointCloudMask {
                continue;
            }
            frame.resize(factor)?;
        }
        Ok(())
    }

    /// Write each frame to `dir/<tag>/<tag><sequence>.<ext>`
    #[instrument(name = "composite_save_all", skip(self, dir), fields(dir = %dir.display()))]
    pub fn save_all(&self, dir: &Path, sequence: u32) -> Result<()> {
        for (frame_id, frame) in &self.frames {
            let tag_dir = dir.join(frame_id.as_str());
            fs::create_dir_all(&tag_dir)?;
            let path = frame.save(&tag_dir.join(format!("{frame_id}{sequence}")))?;
            debug!(frame_id = %frame_id, path = %path.display(), "Saved frame");
        }
        Ok(())
    }

    /// Emit every masked-in grid point in row-major order.
    ///
    /// Colors come from the RGB frame at the same pixel when the frame is
    /// RGB-mappable. Pixels outside the mask's extent count as invalid.
    pub fn to_point_cloud(&self, sink: &mut dyn PointSink) -> Result<()> {
        let grid = self.point_grid()?;
        let mask = self.mask()?;
        let rgb = if self.rgb_mappable {
            let rgb = self.rgb()?;
            if (rgb.rows(), rgb.cols()) != (grid.rows(), grid.cols()) {
                return Err(ListenerError::invalid_argument(format!(
                    "rgb frame {:?} is not aligned with point grid {:?}",
                    rgb.dims(),
                    grid.dims()
                )));
            }
            Some(rgb)
        } else {
            None
        };

        sink.clear();
        for i in 0..grid.rows() {
            for j in 0..grid.cols() {
                if mask.element(i, j, 0) != Some(true) {
                    continue;
                }
                let Some(xyz) = grid.tensor().pixel(i, j) else {
                    continue;
                };
                let color = rgb
                    .and_then(|rgb| rgb.tensor().pixel(i, j))
                    .map(|c| [c[0], c[1], c[2]]);
                sink.push(nalgebra::Vector3::new(xyz[0], xyz[1], xyz[2]), color);
            }
        }
        Ok(())
    }
}

fn typed<'a, T>(
    composite: &'a CompositeFrame,
    frame_id: FrameId,
    cast: fn(&'a DataFrame) -> Option<&'a T>,
) -> Result<&'a T> {
    composite
        .get_frame(frame_id)
        .map(cast)?
        .ok_or(ListenerError::FrameNotFound { frame_id })
}
