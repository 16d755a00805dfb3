//! # Frames
//!
//! Data model of one acquisition cycle.
//!
//! Responsibilities:
//! - Generic row-major tensors with nearest-neighbour resampling
//! - Typed frames (point grid, grayscale, RGB, temperature, validity mask)
//! - `CompositeFrame` assembly with automatic mask derivation
//! - Organizing unorganized scanning-LiDAR clouds into dense grids
//! - Persistence (`.npy`, `.png`, `.ply`)
//!
//! # Example
//!
//! ```
//! use frames::{CompositeFrame, DataFrame, FrameContext, Tensor, TypedFrame};
//! use contracts::FrameId;
//!
//! let grid = Tensor::from_vec(1, 1, 3, vec![0.0, 0.0, 1.5]).unwrap();
//! let frame = DataFrame::point_grid(TypedFrame::new(grid, FrameContext::default())).unwrap();
//! let composite = CompositeFrame::now(false).with_frame(frame).unwrap();
//! assert!(composite.has(FrameId::PointCloudMask));
//! ```

pub mod codec;
mod composite;
mod frame;
pub mod organizer;
mod point_cloud;
mod tensor;

pub use composite::{now_micros, CompositeFrame};
pub use frame::{DataFrame, FrameContext, TypedFrame};
pub use point_cloud::{PointCloud, PointSink};
pub use tensor::{Element, Tensor};
