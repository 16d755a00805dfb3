//! 配置校验模块
//!
//! 校验规则：
//! - 监听器名称唯一 (缺省名称按传感器类型计算)
//! - framerate > 0
//! - resize_factor > 0 且有限
//! - timeout_ms > 0
//! - saved 来源的 frame_ids 不重复

use std::collections::HashSet;

use contracts::{ListenerConfig, ListenerError, ListenerSetup, SensorConfig, SourceConfig};

/// 校验 ListenerSetup 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(setup: &ListenerSetup) -> Result<(), ListenerError> {
    validate_names(setup)?;
    for listener in &setup.listeners {
        let field = format!("listeners[{}]", listener.effective_name());
        validate_sensor(&field, &listener.sensor)?;
        validate_scalars(&field, listener)?;
        validate_source(&field, &listener.source)?;
    }
    Ok(())
}

/// 校验监听器名称唯一性
fn validate_names(setup: &ListenerSetup) -> Result<(), ListenerError> {
    if setup.listeners.is_empty() {
        return Err(ListenerError::config_validation(
            "listeners",
            "at least one listener is required",
        ));
    }
    let mut seen = HashSet::new();
    for listener in &setup.listeners {
        let name = listener.effective_name();
        if !seen.insert(name.clone()) {
            return Err(ListenerError::config_validation(
                format!("listeners[name={name}]"),
                "duplicate listener name",
            ));
        }
    }
    Ok(())
}

/// 校验传感器帧率
fn validate_sensor(field: &str, sensor: &SensorConfig) -> Result<(), ListenerError> {
    let framerate = match sensor {
        // Flexx 帧率由模式决定，在构造时校验
        SensorConfig::Flexx { .. } => return Ok(()),
        // RealSense 允许 0 (设备默认)
        SensorConfig::Realsense { .. } => return Ok(()),
        SensorConfig::Cepton { framerate, .. }
        | SensorConfig::Movia { framerate, .. }
        | SensorConfig::Generic { framerate, .. } => *framerate,
    };
    if framerate == 0 {
        return Err(ListenerError::config_validation(
            format!("{field}.sensor.framerate"),
            "framerate must be > 0",
        ));
    }
    Ok(())
}

/// 校验缩放系数与超时
fn validate_scalars(field: &str, listener: &ListenerConfig) -> Result<(), ListenerError> {
    let factor = listener.resize_factor;
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ListenerError::config_validation(
            format!("{field}.resize_factor"),
            format!("resize_factor must be > 0, got {factor}"),
        ));
    }
    if listener.timeout_ms == 0 {
        return Err(ListenerError::config_validation(
            format!("{field}.timeout_ms"),
            "timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验帧来源
fn validate_source(field: &str, source: &SourceConfig) -> Result<(), ListenerError> {
    match source {
        SourceConfig::Saved { frame_ids, .. } => {
            let mut seen = HashSet::new();
            for id in frame_ids {
                if !seen.insert(id) {
                    return Err(ListenerError::config_validation(
                        format!("{field}.source.frame_ids"),
                        format!("duplicate frame id '{id}'"),
                    ));
                }
            }
        }
        SourceConfig::Synthetic { rows, cols } if *rows == 0 || *cols == 0 => {
            return Err(ListenerError::config_validation(
                format!("{field}.source"),
                "synthetic frames need non-zero rows and cols",
            ));
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FrameId, SensorKind};

    fn listener(name: Option<&str>, sensor: SensorConfig) -> ListenerConfig {
        ListenerConfig {
            name: name.map(str::to_string),
            sensor,
            source: SourceConfig::Synthetic { rows: 4, cols: 4 },
            resize_factor: 1.0,
            timeout_ms: 100,
            param_dir: None,
            identity_name: None,
        }
    }

    fn generic(framerate: u32) -> SensorConfig {
        SensorConfig::Generic {
            kind: SensorKind::Dummy,
            framerate,
            rgb_mappable: false,
        }
    }

    fn setup(listeners: Vec<ListenerConfig>) -> ListenerSetup {
        ListenerSetup {
            version: Default::default(),
            listeners,
        }
    }

    #[test]
    fn test_valid_setup() {
        let s = setup(vec![listener(Some("a"), generic(10)), listener(Some("b"), generic(5))]);
        assert!(validate(&s).is_ok());
    }

    #[test]
    fn test_default_names_collide() {
        let s = setup(vec![listener(None, generic(10)), listener(Some("Dummy"), generic(5))]);
        let err = validate(&s).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_zero_framerate() {
        let s = setup(vec![listener(Some("a"), generic(0))]);
        assert!(validate(&s).unwrap_err().to_string().contains("framerate"));
    }

    #[test]
    fn test_bad_resize_factor() {
        let mut l = listener(Some("a"), generic(10));
        l.resize_factor = 0.0;
        assert!(validate(&setup(vec![l])).unwrap_err().to_string().contains("resize_factor"));
    }

    #[test]
    fn test_duplicate_frame_ids() {
        let mut l = listener(Some("a"), generic(10));
        l.source = SourceConfig::Saved {
            data_dir: "d".into(),
            frame_ids: vec![FrameId::RgbImage, FrameId::RgbImage],
            repeat: false,
        };
        assert!(validate(&setup(vec![l])).is_err());
    }

    #[test]
    fn test_empty_setup() {
        assert!(validate(&setup(vec![])).is_err());
    }
}
