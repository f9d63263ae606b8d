//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DriverBlueprint, LidarMode, SinkType};
use serde::Serialize;
use tracing::info;

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
    lidar_ip: Option<String>,
    computer_ip: Option<String>,
    lidar_mode: String,
    columns_per_frame: usize,
    frequency_hz: u32,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating parameters");

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
        anyhow::bail!("Parameter validation failed")
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
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            // Already checked by the loader
            let mode = blueprint
                .driver
                .lidar_mode
                .parse::<LidarMode>()
                .unwrap_or_default();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    lidar_ip: blueprint.driver.lidar_ip.clone(),
                    computer_ip: blueprint.driver.computer_ip.clone(),
                    lidar_mode: mode.to_string(),
                    columns_per_frame: mode.columns_per_frame(),
                    frequency_hz: mode.frequency_hz(),
                    sink_count: blueprint.sinks.len(),
                }),
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

/// Non-fatal issues worth reporting
fn collect_warnings(blueprint: &DriverBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    // Missing addresses only fail at configure time
    if blueprint.driver.lidar_ip.is_none() {
        warnings.push("driver.lidar_ip is not set - configure will fail".to_string());
    }
    if blueprint.driver.computer_ip.is_none() {
        warnings.push("driver.computer_ip is not set - configure will fail".to_string());
    }

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - products will only be counted".to_string());
    }

    for sink in &blueprint.sinks {
        if sink.sink_type == SinkType::File && !sink.params.contains_key("base_path") {
            warnings.push(format!(
                "Sink '{}' has no base_path - writing to ./output",
                sink.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Parameters valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\nSummary:");
            println!("  Version: {}", summary.version);
            println!(
                "  Sensor: {} -> {}",
                summary.lidar_ip.as_deref().unwrap_or("<unset>"),
                summary.computer_ip.as_deref().unwrap_or("<unset>")
            );
            println!(
                "  Mode: {} ({} columns at {} Hz)",
                summary.lidar_mode, summary.columns_per_frame, summary.frequency_hz
            );
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\nWarnings:");
            for warning in warnings {
                println!("  ⚠ {}", warning);
            }
        }
    } else {
        println!("✗ Parameters invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\nError: {}", error);
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
[driver]
lidar_ip = "10.5.5.86"
lidar_mode = "1024x10"

[[sinks]]
name = "disk"
sink_type = "file"
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.columns_per_frame, 1024);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("computer_ip")));
        assert!(warnings.iter().any(|w| w.contains("base_path")));
    }

    #[test]
    fn test_unknown_mode_is_invalid() {
        let file = write_config("[driver]\nlidar_mode = \"4096x5\"\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
        assert!(run_validate(&args).is_err());
    }
}
