//! In-memory producers for exercising listeners without hardware

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::source::{CaptureDevice, FrameIngest, FrameSource, PollOutcome, SourceContext};
use contracts::{CamParameters, Result, SensorContext, SensorInfo, SensorKind, SensorStatus};
use frames::{CompositeFrame, DataFrame, FrameContext, Tensor, TypedFrame};

/// Sensor context with a fixed 100px pinhole centered at (50, 50)
#[derive(Debug, Clone)]
pub struct MockSensor {
    pub framerate: u32,
    pub rgb_mappable: bool,
}

impl MockSensor {
    pub fn new(framerate: u32) -> Self {
        Self {
            framerate,
            rgb_mappable: false,
        }
    }
}

impl SensorContext for MockSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Dummy
    }

    fn framerate(&self) -> u32 {
        self.framerate
    }

    fn rgb_mappable(&self) -> bool {
        self.rgb_mappable
    }

    fn default_cam_params(&self) -> CamParameters {
        CamParameters::pinhole(100.0, 100.0, 50.0, 50.0)
    }
}

/// Composite frame at `timestamp` holding a small grayscale image filled with `value`
pub fn gray_frame(timestamp: i64, value: u8) -> Result<CompositeFrame> {
    let mut tensor = Tensor::zeros(2, 3, 1);
    tensor.as_mut_slice().fill(value);
    let frame = DataFrame::grayscale(TypedFrame::new(tensor, FrameContext::default()))?;
    CompositeFrame::new(timestamp, false).with_frame(frame)
}

/// Poll source that replays a fixed list of frames
pub struct ScriptedSource {
    script: Vec<CompositeFrame>,
    pending: VecDeque<CompositeFrame>,
    repeat: bool,
    info: SensorInfo,
}

impl ScriptedSource {
    pub fn new(frames: Vec<CompositeFrame>) -> Self {
        Self {
            pending: frames.iter().cloned().collect(),
            script: frames,
            repeat: false,
            info: SensorInfo::new(),
        }
    }

    /// Start over from the first frame instead of exhausting
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn with_info(mut self, key: &str, value: &str) -> Self {
        self.info.insert(key.to_string(), value.to_string());
        self
    }
}

impl FrameSource for ScriptedSource {
    fn poll_frame(&mut self, _ctx: &SourceContext) -> Result<PollOutcome> {
        if self.pending.is_empty() && self.repeat {
            self.pending.extend(self.script.iter().cloned());
        }
        Ok(match self.pending.pop_front() {
            Some(frame) => PollOutcome::Frame(frame),
            None => PollOutcome::Exhausted,
        })
    }

    fn sensor_info(&self) -> SensorInfo {
        self.info.clone()
    }
}

#[derive(Default)]
struct ManualState {
    ingest: Option<FrameIngest>,
    starts: usize,
    stops: usize,
}

/// Callback device whose frames are pushed by the test itself
#[derive(Clone, Default)]
pub struct ManualDevice {
    state: Arc<Mutex<ManualState>>,
}

impl ManualDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a frame as the capture callback would; false when not capturing
    pub fn deliver(&self, frame: CompositeFrame) -> bool {
        match &self.state.lock().ingest {
            Some(ingest) => {
                ingest.push(frame);
                true
            }
            None => false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().ingest.is_some()
    }

    /// (start_capture calls, stop_capture calls)
    pub fn call_counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.starts, state.stops)
    }
}

impl CaptureDevice for ManualDevice {
    fn start_capture(&mut self, ingest: FrameIngest) -> Result<()> {
        let mut state = self.state.lock();
        state.ingest = Some(ingest);
        state.starts += 1;
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.ingest = None;
        state.stops += 1;
        Ok(())
    }

    fn sensor_status(&self) -> SensorStatus {
        let mut status = SensorStatus::new();
        status.insert("Modes".to_string(), vec!["manual".to_string()]);
        status
    }
}
