//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{ListenerSetup, SensorConfig, SourceConfig};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    listener_count: usize,
    listeners: Vec<ListenerSummary>,
}

#[derive(Serialize)]
struct ListenerSummary {
    name: String,
    sensor: String,
    source: String,
    resize_factor: f32,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(setup) => {
            let warnings = collect_warnings(&setup);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&setup)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(setup: &ListenerSetup) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", setup.version),
        listener_count: setup.listeners.len(),
        listeners: setup
            .listeners
            .iter()
            .map(|l| ListenerSummary {
                name: l.effective_name(),
                sensor: l.sensor.kind().to_string(),
                source: source_label(&l.source),
                resize_factor: l.resize_factor,
            })
            .collect(),
    }
}

fn source_label(source: &SourceConfig) -> String {
    match source {
        SourceConfig::Saved { data_dir, .. } => format!("saved ({})", data_dir.display()),
        SourceConfig::Buffer { buffer_dir } => format!("buffer ({})", buffer_dir.display()),
        SourceConfig::Synthetic { rows, cols } => format!("synthetic ({rows}x{cols})"),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(setup: &ListenerSetup) -> Vec<String> {
    let mut warnings = Vec::new();

    for listener in &setup.listeners {
        let name = listener.effective_name();

        if let SourceConfig::Saved { data_dir, .. } | SourceConfig::Buffer { buffer_dir: data_dir } =
            &listener.source
        {
            if !data_dir.is_dir() {
                warnings.push(format!(
                    "Listener '{}' reads from missing directory {}",
                    name,
                    data_dir.display()
                ));
            }
        }

        if listener.param_dir.is_none() {
            warnings.push(format!(
                "Listener '{}' has no param_dir - sensor default camera parameters apply",
                name
            ));
        }

        if listener.identity_name.is_some() && listener.param_dir.is_none() {
            warnings.push(format!(
                "Listener '{}' sets identity_name without param_dir - extrinsic cannot be loaded",
                name
            ));
        }

        if let SensorConfig::Cepton {
            apply_processing: false,
            ..
        }
        | SensorConfig::Movia {
            apply_processing: false,
            ..
        } = listener.sensor
        {
            warnings.push(format!(
                "Listener '{}' disables LiDAR processing - organized grids are not filtered",
                name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Listeners: {}", summary.listener_count);
            for l in &summary.listeners {
                println!(
                    "    - {} [{}] <- {} (resize x{})",
                    l.name, l.sensor, l.source, l.resize_factor
                );
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config(
            r#"
            [[listeners]]
            sensor = { type = "movia", mode = 2, framerate = 10, apply_processing = false }
            source = { type = "buffer", buffer_dir = "/nonexistent/buffer" }
            "#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.listener_count, 1);
        assert_eq!(summary.listeners[0].name, "Movia");
        let warnings = result.warnings.unwrap();
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = write_config(
            r#"
            [[listeners]]
            resize_factor = 0.0
            sensor = { type = "cepton", mode = 1, framerate = 10 }
            source = { type = "synthetic" }
            "#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("resize_factor"));
    }
}
