//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON listener setup files
//! - Validate configuration legality
//! - Persist camera parameters and extrinsics as JSON documents
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let setup = ConfigLoader::load_from_path(Path::new("listeners.toml")).unwrap();
//! println!("Listeners: {}", setup.listeners.len());
//! ```

pub mod camera;
mod parser;
mod validator;

pub use camera::OverwritePolicy;
pub use contracts::ListenerSetup;
pub use parser::ConfigFormat;

use contracts::ListenerError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ListenerSetup, ListenerError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ListenerSetup, ListenerError> {
        let setup = parser::parse(content, format)?;
        validator::validate(&setup)?;
        Ok(setup)
    }

    /// Serialize ListenerSetup to TOML string
    pub fn to_toml(setup: &ListenerSetup) -> Result<String, ListenerError> {
        toml::to_string_pretty(setup)
            .map_err(|e| ListenerError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize ListenerSetup to JSON string
    pub fn to_json(setup: &ListenerSetup) -> Result<String, ListenerError> {
        serde_json::to_string_pretty(setup)
            .map_err(|e| ListenerError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ListenerError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ListenerError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ListenerError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
