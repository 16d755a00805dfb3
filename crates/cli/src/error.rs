//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// No listener of the setup carries the requested name
    #[error("Listener '{name}' not found, available: {available}")]
    ListenerNotFound { name: String, available: String },

    /// A listener stopped producing frames mid-run
    #[error("Listener '{name}' stream failed: {message}")]
    Stream { name: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn listener_not_found(name: impl Into<String>, available: &[String]) -> Self {
        Self::ListenerNotFound {
            name: name.into(),
            available: available.join(", "),
        }
    }

    pub fn stream(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stream {
            name: name.into(),
            message: message.into(),
        }
    }
}
