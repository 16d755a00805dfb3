//! ListenerSetup - Config Loader 输出
//!
//! 描述一组监听器：传感器类型与模式、帧来源、缩放与参数目录。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{FrameId, SensorKind, DEFAULT_TIMEOUT_MS};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的监听器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSetup {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 监听器列表
    pub listeners: Vec<ListenerConfig>,
}

/// 单个监听器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// 监听器名称；缺省时使用传感器类型名
    #[serde(default)]
    pub name: Option<String>,

    /// 传感器描述
    pub sensor: SensorConfig,

    /// 帧来源
    pub source: SourceConfig,

    /// 空间缩放系数，必须 > 0
    #[serde(default = "default_resize_factor")]
    pub resize_factor: f32,

    /// 取帧超时 (ms)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 相机参数目录 (可选)
    #[serde(default)]
    pub param_dir: Option<PathBuf>,

    /// 外参参考传感器名称 (可选)
    #[serde(default)]
    pub identity_name: Option<String>,
}

fn default_resize_factor() -> f32 {
    1.0
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ListenerConfig {
    /// 生效的监听器名称
    pub fn effective_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.sensor.kind().default_name().to_string())
    }
}

/// 传感器类型与模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorConfig {
    /// ToF 相机，模式决定帧率
    Flexx { mode: u32 },

    /// 深度 + 彩色相机
    Realsense {
        width: u32,
        height: u32,
        framerate: u32,
    },

    /// Cepton 扫描式激光雷达
    Cepton {
        mode: u32,
        framerate: u32,
        #[serde(default = "default_true")]
        apply_processing: bool,
    },

    /// Movia 扫描式激光雷达
    Movia {
        mode: u32,
        framerate: u32,
        #[serde(default = "default_true")]
        apply_processing: bool,
    },

    /// 无特殊属性的传感器
    Generic {
        kind: SensorKind,
        framerate: u32,
        #[serde(default)]
        rgb_mappable: bool,
    },
}

fn default_true() -> bool {
    true
}

impl SensorConfig {
    /// 传感器类型
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorConfig::Flexx { .. } => SensorKind::Flexx,
            SensorConfig::Realsense { .. } => SensorKind::RealSense,
            SensorConfig::Cepton { .. } => SensorKind::Cepton,
            SensorConfig::Movia { .. } => SensorKind::Movia,
            SensorConfig::Generic { kind, .. } => *kind,
        }
    }
}

/// 帧来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// 回放已保存的帧
    Saved {
        data_dir: PathBuf,
        #[serde(default)]
        frame_ids: Vec<FrameId>,
        #[serde(default)]
        repeat: bool,
    },

    /// 监视外部程序写入的缓冲目录
    Buffer { buffer_dir: PathBuf },

    /// 合成数据 (无需硬件)
    Synthetic {
        #[serde(default = "default_rows")]
        rows: usize,
        #[serde(default = "default_cols")]
        cols: usize,
    },
}

fn default_rows() -> usize {
    48
}

fn default_cols() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let json = r#"{
            "sensor": { "type": "cepton", "mode": 1, "framerate": 10 },
            "source": { "type": "saved", "data_dir": "/data" }
        }"#;
        let cfg: ListenerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.resize_factor, 1.0);
        assert_eq!(cfg.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(cfg.effective_name(), "Cepton");
        assert_eq!(
            cfg.sensor,
            SensorConfig::Cepton {
                mode: 1,
                framerate: 10,
                apply_processing: true
            }
        );
        assert!(matches!(cfg.source, SourceConfig::Saved { repeat: false, .. }));
    }

    #[test]
    fn test_frame_ids_use_storage_names() {
        let json = r#"{ "type": "saved", "data_dir": "d", "frame_ids": ["ptclGrid", "imgRGB"] }"#;
        let source: SourceConfig = serde_json::from_str(json).unwrap();
        match source {
            SourceConfig::Saved { frame_ids, .. } => {
                assert_eq!(frame_ids, vec![FrameId::PointCloudGrid, FrameId::RgbImage])
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
}
