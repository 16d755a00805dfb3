//! 消费侧指标：帧龄直方图、写盘计数，以及 `watch` 命令使用的内存汇总。

use std::fmt;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, histogram, Unit,
};

/// Attach descriptions to every metric the listener stack emits
pub fn describe_listener_metrics() {
    describe_counter!(
        "sensor_listener_frames_enqueued_total",
        "Composite frames pushed into a listener queue"
    );
    describe_counter!(
        "sensor_listener_frames_consumed_total",
        "Composite frames handed to consumers"
    );
    describe_counter!(
        "sensor_listener_frames_dropped_total",
        "Queued frames discarded by latest-frame reads"
    );
    describe_counter!(
        "sensor_listener_queue_timeouts_total",
        "Reads that gave up waiting for a frame"
    );
    describe_gauge!(
        "sensor_listener_queue_depth",
        "Frames waiting in a listener queue"
    );
    describe_histogram!(
        "sensor_listener_frame_age_ms",
        Unit::Milliseconds,
        "Time between acquisition and consumption of a frame"
    );
    describe_counter!(
        "sensor_listener_frames_saved_total",
        "Composite frames written to disk"
    );
}

pub fn record_frame_age_ms(listener: &str, age_ms: f64) {
    histogram!("sensor_listener_frame_age_ms", "listener" => listener.to_string()).record(age_ms);
}

pub fn record_frames_saved(listener: &str, count: u64) {
    counter!("sensor_listener_frames_saved_total", "listener" => listener.to_string())
        .increment(count);
}

/// Tallies of one consumer loop over a listener
#[derive(Debug, Clone, Default)]
pub struct StreamMetricsAggregator {
    frames: u64,
    dropped: u64,
    timeouts: u64,
    age_sum: f64,
    age_min: f64,
    age_max: f64,
}

impl StreamMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One frame consumed `age_ms` after acquisition; `dropped` frames were
    /// discarded by the read that returned it
    pub fn record_frame(&mut self, age_ms: f64, dropped: u64) {
        if self.frames == 0 {
            self.age_min = age_ms;
            self.age_max = age_ms;
        } else {
            self.age_min = self.age_min.min(age_ms);
            self.age_max = self.age_max.max(age_ms);
        }
        self.frames += 1;
        self.dropped += dropped;
        self.age_sum += age_ms;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn summary(&self) -> StreamSummary {
        let age = (self.frames > 0).then(|| AgeSummary {
            min: self.age_min,
            mean: self.age_sum / self.frames as f64,
            max: self.age_max,
        });
        StreamSummary {
            frames: self.frames,
            dropped: self.dropped,
            timeouts: self.timeouts,
            age,
        }
    }
}

/// Frame age in milliseconds over the consumed frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub frames: u64,
    pub dropped: u64,
    pub timeouts: u64,
    /// None until a frame has been consumed
    pub age: Option<AgeSummary>,
}

impl StreamSummary {
    /// Share of produced frames that a latest-frame read discarded, in percent
    pub fn drop_rate(&self) -> f64 {
        let produced = self.frames + self.dropped;
        if produced == 0 {
            0.0
        } else {
            self.dropped as f64 * 100.0 / produced as f64
        }
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  consumed: {}", self.frames)?;
        writeln!(f, "  dropped:  {} ({:.1}%)", self.dropped, self.drop_rate())?;
        writeln!(f, "  timeouts: {}", self.timeouts)?;
        match self.age {
            Some(age) => writeln!(
                f,
                "  age ms:   {:.2} / {:.2} / {:.2} (min / mean / max)",
                age.min, age.mean, age.max
            ),
            None => writeln!(f, "  age ms:   -"),
        }
    }
}
