//! # Listener
//!
//! 传感器监听器：把任意采集方式桥接为同步的拉取式消费接口。
//!
//! 负责：
//! - 线程安全帧队列（FIFO 读取 / 只取最新帧）
//! - 两种采集方式：自有轮询线程、外部回调推送
//! - 监听器名称注册（依赖注入，非全局）
//! - 相机参数与外参的持久化
//!
//! ## 使用示例
//!
//! ```ignore
//! use listener::{NameRegistry, SensorListener};
//!
//! let registry = NameRegistry::new();
//! let mut listener = SensorListener::builder(&registry, sensor)
//!     .poll(Box::new(source))
//!     .build()?;
//!
//! listener.start_stream()?;
//! while let Ok(frame) = listener.get_next_frame() {
//!     // Handle composite frame
//! }
//! listener.stop_stream()?;
//! ```

mod calibration;
mod config;
mod listener;
pub mod mock;
mod queue;
mod registry;
mod source;

pub use config::{Capabilities, ListenerOptions, MetricsSnapshot, QueueMetrics};
pub use listener::{ListenerBuilder, SensorListener};
pub use queue::FrameQueue;
pub use registry::{NameRegistry, Registration};
pub use source::{
    CaptureDevice, FrameIngest, FrameSource, PollOutcome, SharedFrameContext, SourceContext,
};

pub use config_loader::camera::OverwritePolicy;
