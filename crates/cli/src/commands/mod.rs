//! Command implementations.

mod dump;
mod info;
mod organize;
mod validate;
mod watch;

pub use dump::run_dump;
pub use info::run_info;
pub use organize::run_organize;
pub use validate::run_validate;
pub use watch::run_watch;

use std::path::Path;

use anyhow::{Context, Result};

use config_loader::{ConfigLoader, ListenerSetup};
use contracts::ListenerConfig;

use crate::error::CliError;

/// Load a listener setup, failing early when the file is missing
fn load_setup(path: &Path) -> Result<ListenerSetup> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Listener configs of `setup`, narrowed to `only` when given
fn select_listeners(setup: ListenerSetup, only: Option<&str>) -> Result<Vec<ListenerConfig>> {
    let Some(name) = only else {
        return Ok(setup.listeners);
    };
    let available: Vec<String> = setup.listeners.iter().map(|l| l.effective_name()).collect();
    let selected: Vec<ListenerConfig> = setup
        .listeners
        .into_iter()
        .filter(|l| l.effective_name() == name)
        .collect();
    if selected.is_empty() {
        return Err(CliError::listener_not_found(name, &available).into());
    }
    Ok(selected)
}
