//! Synthetic capture device
//!
//! Generates depth captures of a tilted plane on its own thread, standing in
//! for a hardware SDK that invokes a data callback per cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info};

use contracts::{ListenerError, Result, SensorInfo, SensorStatus};
use frames::now_micros;
use listener::{CaptureDevice, FrameIngest};

use crate::depth::DepthCapture;

/// Fraction of pixels reported with zero confidence
const DROPOUT: f64 = 0.05;

/// Callback-driven device producing a noisy tilted plane
pub struct SyntheticDevice {
    rows: usize,
    cols: usize,
    framerate: u32,
    capturing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticDevice {
    pub fn new(rows: usize, cols: usize, framerate: u32) -> Self {
        Self {
            rows,
            cols,
            framerate: framerate.max(1),
            capturing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    fn serial(&self) -> String {
        format!("SYN-{}x{}", self.rows, self.cols)
    }
}

/// One capture of the plane `z = 2 + 0.02 * row`, seen through a pinhole
/// with focal length `cols` centred on the image
pub fn plane_capture(rows: usize, cols: usize, rng: &mut impl Rng) -> DepthCapture {
    let focal = cols.max(1) as f32;
    let (cx, cy) = (cols as f32 / 2.0, rows as f32 / 2.0);
    let pixels = rows * cols;
    let mut xyz = Vec::with_capacity(pixels);
    let mut confidence = Vec::with_capacity(pixels);
    let mut amplitude = Vec::with_capacity(pixels);

    for i in 0..rows {
        for j in 0..cols {
            let z = 2.0 + 0.02 * i as f32 + rng.random_range(-0.005..0.005);
            xyz.push([(j as f32 - cx) * z / focal, (i as f32 - cy) * z / focal, z]);
            confidence.push(u8::from(!rng.random_bool(DROPOUT)));
            amplitude.push(1000.0 / (z * z));
        }
    }

    DepthCapture {
        rows,
        cols,
        xyz,
        confidence,
        amplitude,
        timestamp_us: now_micros(),
    }
}

impl CaptureDevice for SyntheticDevice {
    fn start_capture(&mut self, ingest: FrameIngest) -> Result<()> {
        if let Some(previous) = self.worker.take() {
            let _ = previous.join();
        }
        self.capturing.store(true, Ordering::Release);

        let capturing = self.capturing.clone();
        let (rows, cols) = (self.rows, self.cols);
        let period = Duration::from_millis(1000 / u64::from(self.framerate));
        let handle = thread::Builder::new()
            .name(format!("synthetic-{}", ingest.listener_name()))
            .spawn(move || {
                let mut rng = rand::rng();
                debug!(listener = %ingest.listener_name(), "Synthetic capture running");
                while capturing.load(Ordering::Acquire) {
                    let ctx = ingest.source_context();
                    match plane_capture(rows, cols, &mut rng).into_composite(&ctx) {
                        Ok(frame) => ingest.push(frame),
                        Err(e) => {
                            error!(listener = %ingest.listener_name(), error = %e, "Synthetic capture failed");
                            break;
                        }
                    }
                    thread::sleep(period);
                }
            })
            .map_err(|e| {
                self.capturing.store(false, Ordering::Release);
                ListenerError::from(e)
            })?;
        self.worker = Some(handle);
        info!(rows, cols, framerate = self.framerate, "Synthetic capture started");
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            handle
                .join()
                .map_err(|_| ListenerError::Other("synthetic capture thread panicked".to_string()))?;
        }
        Ok(())
    }

    fn sensor_info(&self) -> SensorInfo {
        SensorInfo::from([
            ("name".to_string(), "Synthetic plane".to_string()),
            ("serial".to_string(), self.serial()),
            ("firmware".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ])
    }

    fn sensor_status(&self) -> SensorStatus {
        let current = format!("plane {}x{}@{}", self.rows, self.cols, self.framerate);
        SensorStatus::from([(
            "modes".to_string(),
            vec![format!("{current} <------"), "off".to_string()],
        )])
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.capturing.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
