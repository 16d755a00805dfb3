//! FrameId - 帧通道标签
//!
//! 每个标签同时决定保存时的子目录名和文件名前缀。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ListenerError;

/// Semantic channel of a typed frame inside a composite frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrameId {
    /// Organized X/Y/Z grid (float, 3 channels)
    #[serde(rename = "ptclGrid")]
    PointCloudGrid,
    /// 8-bit intensity image (1 channel)
    #[serde(rename = "imgGray")]
    GrayscaleImage,
    /// 8-bit color image (3 channels)
    #[serde(rename = "imgRGB")]
    RgbImage,
    /// Per-pixel temperature (float, 1 channel)
    #[serde(rename = "tempGrid")]
    TemperatureGrid,
    /// Per-pixel validity flags (bool, 1 channel)
    #[serde(rename = "imgDepthMask")]
    PointCloudMask,
}

impl FrameId {
    /// All tags, in storage order
    pub const ALL: [FrameId; 5] = [
        FrameId::PointCloudGrid,
        FrameId::GrayscaleImage,
        FrameId::RgbImage,
        FrameId::TemperatureGrid,
        FrameId::PointCloudMask,
    ];

    /// Directory and file stem used when persisting this channel
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameId::PointCloudGrid => "ptclGrid",
            FrameId::GrayscaleImage => "imgGray",
            FrameId::RgbImage => "imgRGB",
            FrameId::TemperatureGrid => "tempGrid",
            FrameId::PointCloudMask => "imgDepthMask",
        }
    }

    /// Channel count every frame of this kind carries
    pub fn channels(&self) -> usize {
        match self {
            FrameId::PointCloudGrid | FrameId::RgbImage => 3,
            FrameId::GrayscaleImage | FrameId::TemperatureGrid | FrameId::PointCloudMask => 1,
        }
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameId {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FrameId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ListenerError::invalid_argument(format!("unknown frame id '{s}'")))
    }
}
