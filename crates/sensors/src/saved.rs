//! SavedSource - 回放已保存的帧
//!
//! 目录结构与 `CompositeFrame::save_all` 输出一致：`data_dir/<tag>/<tag><n>.<ext>`。
//! 未指定帧类型时，`data_dir` 下直接存放点云网格文件。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use contracts::{FrameId, ListenerError, Result, SensorInfo};
use frames::DataFrame;
use listener::{FrameSource, PollOutcome, SourceContext};

use crate::files::sorted_files;

/// Replays saved frames in natural file order, one composite frame per poll
pub struct SavedSource {
    data_dir: PathBuf,
    files: BTreeMap<FrameId, Vec<PathBuf>>,
    steps: usize,
    index: usize,
    repeat: bool,
    finished: bool,
    repeat_announced: bool,
}

impl SavedSource {
    /// Collect the file lists of `frame_ids` under `data_dir`
    pub fn open(data_dir: &Path, frame_ids: &[FrameId], repeat: bool) -> Result<Self> {
        let mut files = BTreeMap::new();
        if frame_ids.is_empty() {
            files.insert(FrameId::PointCloudGrid, list(data_dir)?);
        } else {
            for frame_id in frame_ids {
                files.insert(*frame_id, list(&data_dir.join(frame_id.as_str()))?);
            }
        }

        let steps = files.values().map(Vec::len).min().unwrap_or(0);
        if files.values().any(|f| f.len() != steps) {
            warn!(
                data_dir = %data_dir.display(),
                steps,
                "Saved frame lists differ in length, replaying the shortest"
            );
        }
        info!(data_dir = %data_dir.display(), steps, channels = files.len(), "Opened saved data");

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            files,
            steps,
            index: 0,
            repeat,
            finished: false,
            repeat_announced: false,
        })
    }

    /// Number of composite frames available
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn advance(&mut self) {
        if self.index + 1 < self.steps {
            self.index += 1;
        } else if self.repeat {
            if !self.repeat_announced {
                info!(data_dir = %self.data_dir.display(), "Reached end of saved data, repeating last frame");
                self.repeat_announced = true;
            }
        } else {
            info!(data_dir = %self.data_dir.display(), "Reached end of saved data");
            self.finished = true;
        }
    }
}

fn list(dir: &Path) -> Result<Vec<PathBuf>> {
    sorted_files(dir).map_err(|e| {
        ListenerError::format(dir.display().to_string(), format!("cannot list saved frames: {e}"))
    })
}

impl FrameSource for SavedSource {
    fn poll_frame(&mut self, ctx: &SourceContext) -> Result<PollOutcome> {
        if self.finished || self.steps == 0 {
            return Ok(PollOutcome::Exhausted);
        }

        let mut composite = ctx.new_composite();
        for (frame_id, files) in &self.files {
            let frame = DataFrame::load(
                *frame_id,
                &files[self.index],
                ctx.sensor.as_ref(),
                ctx.frame.clone(),
            )?;
            composite.add_frame(frame)?;
        }
        composite.resize_all(ctx.resize_factor)?;

        self.advance();
        Ok(PollOutcome::Frame(composite))
    }

    fn sensor_info(&self) -> SensorInfo {
        let mut info = SensorInfo::new();
        info.insert("source".to_string(), "saved".to_string());
        info.insert("data_dir".to_string(), self.data_dir.display().to_string());
        info.insert("frames".to_string(), self.steps.to_string());
        info
    }
}
