//! 相机参数持久化
//!
//! 文件命名：
//! - `{name}_parameters.json`：`intrinsic` (3×3) + `distortion` (5)
//! - `{name}_{identity}_extrinsic.json`：`extrinsic` (4×4)

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use contracts::{CamParameters, Extrinsic, ListenerError, Result, DISTORTION_COEFFS};

/// 目标文件已存在时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// 覆盖
    #[default]
    Overwrite,
    /// 保留原文件，不写入
    KeepExisting,
}

/// Camera parameter document
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CamParametersDoc {
    #[validate(custom(function = "finite_rows3"))]
    pub intrinsic: [[f32; 3]; 3],
    #[validate(custom(function = "finite_values"))]
    pub distortion: [f32; DISTORTION_COEFFS],
}

/// Extrinsic matrix document
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtrinsicDoc {
    #[validate(custom(function = "finite_rows4"))]
    pub extrinsic: [[f32; 4]; 4],
}

fn finite_values(values: &[f32; DISTORTION_COEFFS]) -> std::result::Result<(), ValidationError> {
    check_finite(values.iter())
}

fn finite_rows3(rows: &[[f32; 3]; 3]) -> std::result::Result<(), ValidationError> {
    check_finite(rows.iter().flatten())
}

fn finite_rows4(rows: &[[f32; 4]; 4]) -> std::result::Result<(), ValidationError> {
    check_finite(rows.iter().flatten())
}

fn check_finite<'a>(mut values: impl Iterator<Item = &'a f32>) -> std::result::Result<(), ValidationError> {
    if values.all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite"))
    }
}

impl From<&CamParameters> for CamParametersDoc {
    fn from(params: &CamParameters) -> Self {
        let m = &params.intrinsic;
        Self {
            intrinsic: std::array::from_fn(|i| std::array::from_fn(|j| m[(i, j)])),
            distortion: params.distortion,
        }
    }
}

impl From<CamParametersDoc> for CamParameters {
    fn from(doc: CamParametersDoc) -> Self {
        CamParameters::new(Matrix3::from_fn(|i, j| doc.intrinsic[i][j]), doc.distortion)
    }
}

impl From<&Extrinsic> for ExtrinsicDoc {
    fn from(m: &Extrinsic) -> Self {
        Self {
            extrinsic: std::array::from_fn(|i| std::array::from_fn(|j| m[(i, j)])),
        }
    }
}

impl From<ExtrinsicDoc> for Extrinsic {
    fn from(doc: ExtrinsicDoc) -> Self {
        Matrix4::from_fn(|i, j| doc.extrinsic[i][j])
    }
}

/// `{dir}/{name}_parameters.json`
pub fn parameters_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}_parameters.json"))
}

/// `{dir}/{name}_{identity}_extrinsic.json`
pub fn extrinsic_path(dir: &Path, name: &str, identity: &str) -> PathBuf {
    dir.join(format!("{name}_{identity}_extrinsic.json"))
}

fn require_identity(identity: Option<&str>) -> Result<&str> {
    identity.filter(|s| !s.is_empty()).ok_or_else(|| {
        ListenerError::config_validation("identity_name", "sensor does not know the identity sensor's name")
    })
}

fn write_json<T: Serialize>(path: &Path, doc: &T, policy: OverwritePolicy) -> Result<bool> {
    if policy == OverwritePolicy::KeepExisting && path.exists() {
        warn!(path = %path.display(), "File exists, not overwritten");
        return Ok(false);
    }
    let content = serde_json::to_string_pretty(doc)
        .map_err(|e| ListenerError::config_parse(format!("JSON serialize error: {e}")))?;
    fs::write(path, content)?;
    info!(path = %path.display(), "Wrote camera document");
    Ok(true)
}

fn read_json<T: for<'de> Deserialize<'de> + Validate>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    let doc: T = serde_json::from_str(&content).map_err(|e| ListenerError::ConfigParse {
        message: format!("{}: {e}", path.display()),
        source: Some(Box::new(e)),
    })?;
    doc.validate().map_err(|e| {
        ListenerError::config_validation(path.display().to_string(), e.to_string())
    })?;
    Ok(doc)
}

/// Save intrinsic and distortion; returns whether the file was written
pub fn save_cam_params(
    dir: &Path,
    name: &str,
    params: &CamParameters,
    policy: OverwritePolicy,
) -> Result<bool> {
    write_json(&parameters_path(dir, name), &CamParametersDoc::from(params), policy)
}

/// Load intrinsic and distortion
pub fn load_cam_params(dir: &Path, name: &str) -> Result<CamParameters> {
    read_json::<CamParametersDoc>(&parameters_path(dir, name)).map(Into::into)
}

/// Save the extrinsic relative to `identity`; returns whether the file was written
pub fn save_extrinsic(
    dir: &Path,
    name: &str,
    identity: Option<&str>,
    extrinsic: &Extrinsic,
    policy: OverwritePolicy,
) -> Result<bool> {
    let identity = require_identity(identity)?;
    write_json(
        &extrinsic_path(dir, name, identity),
        &ExtrinsicDoc::from(extrinsic),
        policy,
    )
}

/// Load the extrinsic relative to `identity`
pub fn load_extrinsic(dir: &Path, name: &str, identity: Option<&str>) -> Result<Extrinsic> {
    let identity = require_identity(identity)?;
    read_json::<ExtrinsicDoc>(&extrinsic_path(dir, name, identity)).map(Into::into)
}
