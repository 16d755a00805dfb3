//! SensorListener - 传感器采集与同步消费之间的桥梁
//!
//! 一个监听器持有:
//! - 帧队列 [`FrameQueue`]（生产者/消费者唯一共享资源）
//! - 采集驱动: 自有轮询线程 ([`FrameSource`]) 或外部回调 ([`CaptureDevice`])
//! - 名称注册守卫，析构时释放名称

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Capabilities, ListenerOptions, MetricsSnapshot, QueueMetrics};
use crate::queue::FrameQueue;
use crate::registry::{NameRegistry, Registration};
use crate::source::{
    CaptureDevice, FrameIngest, FrameSource, PollOutcome, SharedFrameContext,
};
use contracts::{
    Extrinsic, ListenerError, Result, SensorContext, SensorInfo, SensorStatus,
};
use frames::{CompositeFrame, FrameContext};

/// Calibration state beyond the camera parameters held in the frame context
#[derive(Debug, Clone, Default)]
pub(crate) struct Calibration {
    pub(crate) identity_name: Option<String>,
}

enum Driver {
    /// Frames arrive through [`FrameIngest`]; the device is optional for passive listeners
    Callback {
        device: Option<Mutex<Box<dyn CaptureDevice>>>,
    },
    /// Frames are pulled by a listener-owned thread
    Poll {
        source: Arc<Mutex<Box<dyn FrameSource>>>,
        worker: Option<JoinHandle<()>>,
    },
}

/// Sensor listener
pub struct SensorListener {
    name: Arc<str>,
    framerate: u32,
    capabilities: Capabilities,
    sensor: Arc<dyn SensorContext>,
    queue: Arc<FrameQueue>,
    metrics: Arc<QueueMetrics>,
    streaming: Arc<AtomicBool>,
    timeout: Duration,
    pub(crate) calibration: Option<Calibration>,
    pub(crate) frame_context: SharedFrameContext,
    pub(crate) resize_factor: f32,
    driver: Driver,
    _registration: Registration,
}

impl SensorListener {
    pub fn builder<'a>(
        registry: &'a NameRegistry,
        sensor: Arc<dyn SensorContext>,
    ) -> ListenerBuilder<'a> {
        ListenerBuilder::new(registry, sensor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn sensor(&self) -> &Arc<dyn SensorContext> {
        &self.sensor
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn resize_factor(&self) -> f32 {
        self.resize_factor
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Frames waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Handle that pushes frames into this listener's queue
    pub fn ingest_handle(&self) -> FrameIngest {
        FrameIngest::new(
            self.name.clone(),
            self.queue.clone(),
            self.metrics.clone(),
            self.frame_context.clone(),
            self.resize_factor,
            self.sensor.clone(),
        )
    }

    /// Begin acquisition. Fails if the listener is already streaming.
    #[instrument(name = "listener_start", skip(self), fields(listener = %self.name))]
    pub fn start_stream(&mut self) -> Result<()> {
        if self.streaming.swap(true, Ordering::AcqRel) {
            return Err(ListenerError::stream_state(
                &*self.name,
                "start requested while already streaming",
            ));
        }

        let ingest = self.ingest_handle();
        let result = match &mut self.driver {
            Driver::Callback { device } => match device {
                Some(device) => device.lock().start_capture(ingest),
                None => Ok(()),
            },
            Driver::Poll { source, worker } => {
                // A worker that ended on its own still needs joining
                if let Some(finished) = worker.take() {
                    if finished.join().is_err() {
                        warn!(listener = %self.name, "Previous poll thread panicked");
                    }
                }
                let source = source.clone();
                let streaming = self.streaming.clone();
                let period = frame_period(self.framerate);
                thread::Builder::new()
                    .name(format!("listener-{}", self.name))
                    .spawn(move || poll_loop(source, ingest, streaming, period))
                    .map(|handle| *worker = Some(handle))
                    .map_err(ListenerError::from)
            }
        };

        match result {
            Ok(()) => {
                info!(framerate = self.framerate, "Stream started");
                Ok(())
            }
            Err(e) => {
                self.streaming.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// End acquisition. Queued frames stay consumable.
    ///
    /// Fails if the listener is not streaming, unless its poll thread ended
    /// by itself and has not been joined yet.
    #[instrument(name = "listener_stop", skip(self), fields(listener = %self.name))]
    pub fn stop_stream(&mut self) -> Result<()> {
        let was_streaming = self.streaming.swap(false, Ordering::AcqRel);
        match &mut self.driver {
            Driver::Callback { device } => {
                if !was_streaming {
                    return Err(not_streaming(&self.name));
                }
                if let Some(device) = device {
                    device.lock().stop_capture()?;
                }
            }
            Driver::Poll { worker, .. } => {
                let Some(handle) = worker.take() else {
                    return Err(not_streaming(&self.name));
                };
                handle.join().map_err(|_| {
                    ListenerError::Other(format!("poll thread of '{}' panicked", self.name))
                })?;
            }
        }
        info!(queued = self.queue.len(), "Stream stopped");
        Ok(())
    }

    /// Oldest queued frame, waiting up to the timeout for one to arrive
    pub fn get_next_frame(&self) -> Result<CompositeFrame> {
        match self.queue.pop_next(self.timeout) {
            Some((frame, remaining)) => {
                self.record_consumed(0, remaining);
                Ok(frame)
            }
            None => Err(self.timed_out()),
        }
    }

    /// Newest frame since the last read; older queued frames are discarded
    pub fn get_latest_frame(&self) -> Result<CompositeFrame> {
        match self.queue.pop_latest(self.timeout) {
            Some((frame, dropped)) => {
                self.record_consumed(dropped, 0);
                Ok(frame)
            }
            None => Err(self.timed_out()),
        }
    }

    fn record_consumed(&self, dropped: usize, remaining: usize) {
        self.metrics.record_consumed(dropped, remaining);
        counter!("sensor_listener_frames_consumed_total", "listener" => self.name.to_string())
            .increment(1);
        if dropped > 0 {
            counter!("sensor_listener_frames_dropped_total", "listener" => self.name.to_string())
                .increment(dropped as u64);
        }
    }

    fn timed_out(&self) -> ListenerError {
        self.metrics.record_timeout();
        counter!("sensor_listener_queue_timeouts_total", "listener" => self.name.to_string())
            .increment(1);
        let waited_ms = self.timeout.as_millis() as u64;
        debug!(listener = %self.name, waited_ms, "Timed out waiting for frame");
        ListenerError::QueueTimeout {
            name: self.name.to_string(),
            waited_ms,
        }
    }

    pub fn sensor_info(&self) -> SensorInfo {
        match &self.driver {
            Driver::Callback {
                device: Some(device),
            } => device.lock().sensor_info(),
            Driver::Callback { device: None } => SensorInfo::new(),
            Driver::Poll { source, .. } => source.lock().sensor_info(),
        }
    }

    pub fn sensor_status(&self) -> SensorStatus {
        match &self.driver {
            Driver::Callback {
                device: Some(device),
            } => device.lock().sensor_status(),
            Driver::Callback { device: None } => SensorStatus::new(),
            Driver::Poll { source, .. } => source.lock().sensor_status(),
        }
    }

    /// Human-readable sensor info followed by status lists
    pub fn info_and_status_report(&self) -> String {
        let mut report = String::from("SENSOR INFO:\n");
        for (key, value) in self.sensor_info() {
            let _ = writeln!(report, "{key}: {value}");
        }
        report.push_str("\nSENSOR STATUS:\n");
        for (key, items) in self.sensor_status() {
            let _ = writeln!(report, "{key}:");
            for item in items {
                let _ = writeln!(report, "{item}");
            }
            report.push('\n');
        }
        report
    }

    pub fn print_info_and_status(&self) {
        print!("{}", self.info_and_status_report());
    }

    /// Stream and save the newest frame each cycle under `dir` until a read
    /// times out or `max_frames` frames are written.
    ///
    /// Sequence numbers start at 1. Returns the number of frames written.
    #[instrument(name = "listener_dump", skip(self, dir), fields(listener = %self.name, dir = %dir.display()))]
    pub fn dump_stream(&mut self, dir: &Path, max_frames: Option<u32>) -> Result<u32> {
        fs::create_dir_all(dir)?;
        self.start_stream()?;

        let mut written = 0u32;
        let outcome = loop {
            if max_frames.is_some_and(|max| written >= max) {
                break Ok(());
            }
            let frame = match self.get_latest_frame() {
                Ok(frame) => frame,
                Err(e) if e.is_recoverable() => {
                    info!(error = %e, written, "Dump finished");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };
            if let Err(e) = frame.save_all(dir, written + 1) {
                break Err(e);
            }
            written += 1;
        };

        if let Err(e) = self.stop_stream() {
            warn!(error = %e, "Stop after dump failed");
        }
        outcome.map(|()| written)
    }

    pub(crate) fn require_calibration(&self) -> Result<&Calibration> {
        self.calibration.as_ref().ok_or_else(|| {
            ListenerError::invalid_argument(format!(
                "listener '{}' has no calibration capability",
                self.name
            ))
        })
    }
}

impl Drop for SensorListener {
    fn drop(&mut self) {
        let was_streaming = self.streaming.swap(false, Ordering::AcqRel);
        match &mut self.driver {
            Driver::Callback {
                device: Some(device),
            } if was_streaming => {
                if let Err(e) = device.lock().stop_capture() {
                    warn!(listener = %self.name, error = %e, "Failed to stop capture on drop");
                }
            }
            Driver::Poll { worker, .. } => {
                if let Some(handle) = worker.take() {
                    if handle.join().is_err() {
                        warn!(listener = %self.name, "Poll thread panicked");
                    }
                }
            }
            _ => {}
        }
    }
}

fn not_streaming(name: &str) -> ListenerError {
    ListenerError::stream_state(name, "stop requested while not streaming")
}

fn frame_period(framerate: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(framerate.max(1)))
}

/// Body of the listener-owned thread: one poll then one frame period of sleep
fn poll_loop(
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    ingest: FrameIngest,
    streaming: Arc<AtomicBool>,
    period: Duration,
) {
    debug!(listener = %ingest.listener_name(), ?period, "Poll thread running");
    // clears the flag on every exit, unwinding included
    let _running = ClearOnDrop(streaming.clone());
    while streaming.load(Ordering::Acquire) {
        let ctx = ingest.source_context();
        let outcome = source.lock().poll_frame(&ctx);
        match outcome {
            Ok(PollOutcome::Frame(frame)) => ingest.push(frame),
            Ok(PollOutcome::Pending) => {}
            Ok(PollOutcome::Exhausted) => {
                info!(listener = %ingest.listener_name(), "Source exhausted");
                break;
            }
            Err(e) => {
                error!(listener = %ingest.listener_name(), error = %e, "Poll failed, ending stream");
                break;
            }
        }
        thread::sleep(period);
    }
}

struct ClearOnDrop(Arc<AtomicBool>);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for [`SensorListener`]
pub struct ListenerBuilder<'a> {
    registry: &'a NameRegistry,
    sensor: Arc<dyn SensorContext>,
    name: Option<String>,
    framerate: Option<u32>,
    options: ListenerOptions,
    calibrated: bool,
    param_dir: Option<PathBuf>,
    identity_name: Option<String>,
    driver: Option<Driver>,
}

impl<'a> ListenerBuilder<'a> {
    pub fn new(registry: &'a NameRegistry, sensor: Arc<dyn SensorContext>) -> Self {
        Self {
            registry,
            sensor,
            name: None,
            framerate: None,
            options: ListenerOptions::default(),
            calibrated: false,
            param_dir: None,
            identity_name: None,
            driver: None,
        }
    }

    /// Defaults to the sensor kind's name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Defaults to the sensor's nominal framerate
    pub fn framerate(mut self, framerate: u32) -> Self {
        self.framerate = Some(framerate);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn resize_factor(mut self, factor: f32) -> Self {
        self.options.resize_factor = factor;
        self
    }

    pub fn options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    /// Give the listener camera parameters, optionally loaded from `param_dir`
    pub fn calibrated(mut self, param_dir: Option<PathBuf>) -> Self {
        self.calibrated = true;
        self.param_dir = param_dir;
        self
    }

    /// Name of the sensor extrinsics are expressed relative to
    pub fn identity_name(mut self, identity: impl Into<String>) -> Self {
        self.identity_name = Some(identity.into());
        self
    }

    /// Drive the listener from its own thread polling `source`
    pub fn poll(mut self, source: Box<dyn FrameSource>) -> Self {
        self.driver = Some(Driver::Poll {
            source: Arc::new(Mutex::new(source)),
            worker: None,
        });
        self
    }

    /// Let `device` push frames from its own capture activity
    pub fn callback(mut self, device: Box<dyn CaptureDevice>) -> Self {
        self.driver = Some(Driver::Callback {
            device: Some(Mutex::new(device)),
        });
        self
    }

    pub fn build(self) -> Result<SensorListener> {
        let factor = self.options.resize_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ListenerError::invalid_argument(format!(
                "resize factor must be positive, got {factor}"
            )));
        }

        let name = self
            .name
            .unwrap_or_else(|| self.sensor.kind().default_name().to_string());
        let registration = self.registry.register(&name)?;

        let mut cam_params = self.sensor.default_cam_params();
        let mut extrinsic = Extrinsic::identity();
        if self.calibrated {
            if let Some(dir) = &self.param_dir {
                match config_loader::camera::load_cam_params(dir, &name) {
                    Ok(loaded) => cam_params = loaded,
                    Err(e) => warn!(listener = %name, error = %e, "Using default camera parameters"),
                }
                if self.identity_name.is_some() {
                    match config_loader::camera::load_extrinsic(
                        dir,
                        &name,
                        self.identity_name.as_deref(),
                    ) {
                        Ok(loaded) => extrinsic = loaded,
                        Err(e) => warn!(listener = %name, error = %e, "Using identity extrinsic"),
                    }
                }
            }
        }
        let frame_context = FrameContext::new(
            Arc::new(cam_params.rescaled(factor)),
            Arc::new(extrinsic),
        );

        let driver = self
            .driver
            .unwrap_or(Driver::Callback { device: None });
        let capabilities = Capabilities {
            has_calibration: self.calibrated,
            has_own_thread: matches!(driver, Driver::Poll { .. }),
        };
        let framerate = self.framerate.unwrap_or_else(|| self.sensor.framerate());

        info!(
            listener = %name,
            kind = %self.sensor.kind(),
            framerate,
            resize_factor = factor,
            ?capabilities,
            "Listener created"
        );

        Ok(SensorListener {
            name: Arc::from(name.as_str()),
            framerate,
            capabilities,
            sensor: self.sensor,
            queue: Arc::new(FrameQueue::new()),
            metrics: Arc::new(QueueMetrics::new()),
            streaming: Arc::new(AtomicBool::new(false)),
            timeout: self.options.timeout,
            calibration: self.calibrated.then(|| Calibration {
                identity_name: self.identity_name,
            }),
            frame_context: Arc::new(RwLock::new(frame_context)),
            resize_factor: factor,
            driver,
            _registration: registration,
        })
    }
}
