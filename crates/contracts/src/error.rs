//! Layered error definitions
//!
//! Categorized by source: listener lifecycle / frame access / persisted data / config

use thiserror::Error;

use crate::FrameId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ListenerError {
    // ===== Listener Lifecycle Errors =====
    /// A listener with this name is already registered
    #[error("a listener named '{name}' already exists")]
    DuplicateName { name: String },

    /// Start while streaming, or stop while not streaming
    #[error("listener '{name}': {message}")]
    StreamState { name: String, message: String },

    /// No frame arrived before the timeout elapsed
    #[error("listener '{name}' timed out after {waited_ms}ms waiting for a frame")]
    QueueTimeout { name: String, waited_ms: u64 },

    // ===== Frame Errors =====
    /// Requested channel is absent from a composite frame
    #[error("frame '{frame_id}' not found in composite frame")]
    FrameNotFound { frame_id: FrameId },

    /// Unsupported or malformed persisted encoding
    #[error("format error for '{path}': {message}")]
    Format { path: String, message: String },

    /// Argument outside the accepted domain
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ListenerError {
    /// Create duplicate name error
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Create stream state error
    pub fn stream_state(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamState {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create format error
    pub fn format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the failed operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueTimeout { .. })
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, ListenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_recoverable() {
        let err = ListenerError::QueueTimeout {
            name: "cam".into(),
            waited_ms: 50,
        };
        assert!(err.is_recoverable());
        assert!(!ListenerError::duplicate_name("cam").is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = ListenerError::FrameNotFound {
            frame_id: FrameId::RgbImage,
        };
        assert_eq!(
            err.to_string(),
            "frame 'imgRGB' not found in composite frame"
        );

        let err = ListenerError::format("scan.npz", "unsupported point grid encoding");
        assert!(err.to_string().contains("scan.npz"));
    }
}
