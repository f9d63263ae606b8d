//! Parameter loading and controller construction shared by `run` and `metadata`

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::DriverBlueprint;
use driver::LifecycleController;
use ingestion::MockSensor;
use tracing::info;

use crate::cli::SensorArgs;
use crate::error::CliError;

/// Load the parameter file (or defaults) and apply CLI overrides
pub fn load_blueprint(args: &SensorArgs) -> Result<DriverBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            info!(config = %path.display(), "Loading parameters");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load parameters from {}", path.display()))?
        }
        None => DriverBlueprint::default(),
    };

    let driver = &mut blueprint.driver;
    if let Some(ref ip) = args.lidar_ip {
        info!(lidar_ip = %ip, "Overriding lidar_ip from CLI");
        driver.lidar_ip = Some(ip.clone());
    }
    if let Some(ref ip) = args.computer_ip {
        info!(computer_ip = %ip, "Overriding computer_ip from CLI");
        driver.computer_ip = Some(ip.clone());
    }
    if let Some(ref mode) = args.lidar_mode {
        info!(lidar_mode = %mode, "Overriding lidar_mode from CLI");
        driver.lidar_mode = mode.clone();
    }
    if args.simulate {
        // The simulated sensor never opens a socket but still needs addresses
        driver.lidar_ip.get_or_insert_with(|| "127.0.0.1".to_string());
        driver.computer_ip.get_or_insert_with(|| "127.0.0.1".to_string());
    }

    ConfigLoader::validate(&blueprint).context("Parameter validation failed")?;
    Ok(blueprint)
}

/// Controller for the real sensor, or for a simulated one with `--simulate`
pub fn build_controller(args: &SensorArgs, blueprint: &DriverBlueprint) -> LifecycleController {
    let builder =
        LifecycleController::builder(blueprint.driver.clone()).sinks(blueprint.sinks.clone());

    if !args.simulate {
        return builder.build();
    }
    let beams = args.beams;
    info!(beams, "Using simulated sensor");
    builder
        .sensor(move || Box::new(MockSensor::simulated("os1-sim", beams)))
        .build()
}
