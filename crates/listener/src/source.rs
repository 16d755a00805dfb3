//! Acquisition seams of a listener.
//!
//! Two disciplines feed the queue:
//! - [`FrameSource`]: polled once per cycle by the listener's own thread
//! - [`CaptureDevice`]: runs its own capture and pushes through a
//!   [`FrameIngest`] handle on whatever thread it likes

use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::RwLock;

use crate::config::QueueMetrics;
use crate::queue::FrameQueue;
use contracts::{Result, SensorContext, SensorInfo, SensorStatus};
use frames::{CompositeFrame, FrameContext};

/// Frame context that calibration updates and producers read
pub type SharedFrameContext = Arc<RwLock<FrameContext>>;

/// What a producer needs to build one composite frame
#[derive(Clone)]
pub struct SourceContext {
    /// Camera parameters and extrinsic for new frames
    pub frame: FrameContext,

    /// Resize applied to each composite frame before it is queued
    pub resize_factor: f32,

    /// Sensor the frames come from
    pub sensor: Arc<dyn SensorContext>,
}

impl SourceContext {
    /// Empty composite frame stamped now, with the sensor's RGB mappability
    pub fn new_composite(&self) -> CompositeFrame {
        CompositeFrame::now(self.sensor.rgb_mappable())
    }
}

/// Result of one poll
#[derive(Debug)]
pub enum PollOutcome {
    /// A frame is ready to queue
    Frame(CompositeFrame),

    /// Nothing new this cycle
    Pending,

    /// The source has no more data; the stream ends
    Exhausted,
}

/// Poll-driven producer, called once per cycle from the listener thread
pub trait FrameSource: Send {
    fn poll_frame(&mut self, ctx: &SourceContext) -> Result<PollOutcome>;

    fn sensor_info(&self) -> SensorInfo {
        SensorInfo::new()
    }

    fn sensor_status(&self) -> SensorStatus {
        SensorStatus::new()
    }
}

/// Callback-driven producer with its own capture activity
pub trait CaptureDevice: Send {
    /// Begin capturing; frames go to `ingest`
    fn start_capture(&mut self, ingest: FrameIngest) -> Result<()>;

    /// Stop capturing; no pushes may happen after this returns
    fn stop_capture(&mut self) -> Result<()>;

    fn sensor_info(&self) -> SensorInfo {
        SensorInfo::new()
    }

    fn sensor_status(&self) -> SensorStatus {
        SensorStatus::new()
    }
}

/// Ingestion entry point of a listener, cheap to clone across threads
#[derive(Clone)]
pub struct FrameIngest {
    name: Arc<str>,
    queue: Arc<FrameQueue>,
    metrics: Arc<QueueMetrics>,
    frame_context: SharedFrameContext,
    resize_factor: f32,
    sensor: Arc<dyn SensorContext>,
}

impl FrameIngest {
    pub(crate) fn new(
        name: Arc<str>,
        queue: Arc<FrameQueue>,
        metrics: Arc<QueueMetrics>,
        frame_context: SharedFrameContext,
        resize_factor: f32,
        sensor: Arc<dyn SensorContext>,
    ) -> Self {
        Self {
            name,
            queue,
            metrics,
            frame_context,
            resize_factor,
            sensor,
        }
    }

    /// Name of the listener this handle feeds
    pub fn listener_name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current camera context and resize settings
    pub fn source_context(&self) -> SourceContext {
        SourceContext {
            frame: self.frame_context.read().clone(),
            resize_factor: self.resize_factor,
            sensor: self.sensor.clone(),
        }
    }

    /// Queue one frame and wake a consumer
    pub fn push(&self, frame: CompositeFrame) {
        let len = self.queue.push(frame);
        self.metrics.record_enqueued(len);
        counter!("sensor_listener_frames_enqueued_total", "listener" => self.name.to_string())
            .increment(1);
        gauge!("sensor_listener_queue_depth", "listener" => self.name.to_string()).set(len as f64);
    }
}
