//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{CaptureBlueprint, ConfigLoader};
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
    carla: String,
    frames: u64,
    output_dir: Option<String>,
    vehicle: String,
    lidar: String,
    camera: String,
}

impl ConfigSummary {
    fn from_blueprint(blueprint: &CaptureBlueprint) -> Self {
        let lidar = &blueprint.lidar;
        let camera = &blueprint.camera;
        Self {
            carla: format!("{}:{}", blueprint.carla.host, blueprint.carla.port),
            frames: blueprint.capture.frames,
            output_dir: blueprint
                .capture
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string()),
            vehicle: blueprint.vehicle.blueprint.clone(),
            lidar: format!(
                "{} ({} ch, {} Hz, {} pts/s)",
                lidar.blueprint, lidar.channels, lidar.rotation_frequency, lidar.points_per_second
            ),
            camera: format!(
                "{} ({}x{}, fov {})",
                camera.blueprint, camera.image_size_x, camera.image_size_y, camera.fov
            ),
        }
    }
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

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary::from_blueprint(&blueprint)),
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

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CaptureBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.capture.output_dir.is_none() {
        warnings.push("capture.output_dir is unset - `run` will need --out".to_string());
    }

    if blueprint.capture.poll_interval_ms > 1000 {
        warnings.push(format!(
            "capture.poll_interval_ms = {} - Ctrl-C may take over a second to take effect",
            blueprint.capture.poll_interval_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  CARLA: {}", summary.carla);
            println!("  Frames: {}", summary.frames);
            println!(
                "  Output: {}",
                summary.output_dir.as_deref().unwrap_or("(unset)")
            );
            println!("  Vehicle: {}", summary.vehicle);
            println!("  LiDAR: {}", summary.lidar);
            println!("  Camera: {}", summary.camera);
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
