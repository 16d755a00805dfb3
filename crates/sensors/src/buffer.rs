//! BufferSource - 监视外部程序持续写入的缓冲目录
//!
//! 最新文件可能仍在写入，因此总是读取倒数第二个文件。

use std::path::{Path, PathBuf};

use tracing::debug;

use contracts::{FrameId, ListenerError, Result, SensorInfo};
use frames::{DataFrame, TypedFrame};
use listener::{FrameSource, PollOutcome, SourceContext};

use crate::depth::scale_to_gray;
use crate::files::sorted_files;

/// Loads the second-newest point-grid file of a directory whenever it changes
pub struct BufferSource {
    buffer_dir: PathBuf,
    previous: Option<PathBuf>,
}

impl BufferSource {
    pub fn new(buffer_dir: impl Into<PathBuf>) -> Self {
        Self {
            buffer_dir: buffer_dir.into(),
            previous: None,
        }
    }

    pub fn buffer_dir(&self) -> &Path {
        &self.buffer_dir
    }
}

impl FrameSource for BufferSource {
    fn poll_frame(&mut self, ctx: &SourceContext) -> Result<PollOutcome> {
        let files = sorted_files(&self.buffer_dir)?;
        let Some(current) = files.len().checked_sub(2).map(|i| &files[i]) else {
            return Ok(PollOutcome::Pending);
        };
        if self.previous.as_ref() == Some(current) {
            return Ok(PollOutcome::Pending);
        }
        self.previous = Some(current.clone());
        debug!(path = %current.display(), "Loading buffered point grid");

        let grid = match DataFrame::load(
            FrameId::PointCloudGrid,
            current,
            ctx.sensor.as_ref(),
            ctx.frame.clone(),
        )? {
            DataFrame::PointGrid(grid) => grid,
            other => {
                return Err(ListenerError::format(
                    current.display().to_string(),
                    format!("expected a point grid, loaded {}", other.frame_id()),
                ))
            }
        };

        let gray = scale_to_gray(&grid.tensor().channel(2)?);
        let rgb = gray.broadcast_channels(3)?;

        let mut composite = ctx.new_composite();
        composite.add_frame(DataFrame::grayscale(TypedFrame::new(gray, ctx.frame.clone()))?)?;
        composite.add_frame(DataFrame::rgb(TypedFrame::new(rgb, ctx.frame.clone()))?)?;
        composite.add_frame(DataFrame::PointGrid(grid))?;
        composite.resize_all(ctx.resize_factor)?;
        Ok(PollOutcome::Frame(composite))
    }

    fn sensor_info(&self) -> SensorInfo {
        let mut info = SensorInfo::new();
        info.insert("source".to_string(), "buffer".to_string());
        info.insert("buffer_dir".to_string(), self.buffer_dir.display().to_string());
        info
    }
}
