//! On-disk encodings used by the frame types.

pub mod npy;
pub mod ply;
pub mod raster;
