//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use driver::{LifecycleController, LifecycleState, ServiceHandle};
use tokio::time::{interval_at, Instant};
use tracing::{error, info, warn};

use crate::cli::{RunArgs, SensorArgs};
use crate::commands::sensor::{build_controller, load_blueprint};
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_driver(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.sensor)?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    info!(
        lidar_ip = ?blueprint.driver.lidar_ip,
        computer_ip = ?blueprint.driver.computer_ip,
        mode = %blueprint.driver.lidar_mode,
        sinks = blueprint.sinks.len(),
        "Parameters loaded"
    );

    let mut controller = build_controller(&args.sensor, &blueprint);
    controller.configure().await.context("Configure failed")?;
    controller.activate().await.context("Activate failed")?;

    let result = stream(&controller, args).await;

    if controller.state() == LifecycleState::Active {
        controller.deactivate().await.context("Deactivate failed")?;
    }
    let stats = controller.stats();
    controller.shutdown().await.context("Shutdown failed")?;

    info!(
        cycles = stats.cycle.cycles,
        skipped = stats.cycle.skipped_cycles,
        frames = stats.cycle.frames_published,
        incomplete = stats.cycle.incomplete_frames,
        imu = stats.cycle.imu_published,
        resets = stats.cycle.resets,
        "Driver finished"
    );
    println!("\n{}", stats.frames);

    result
}

/// Wait for a stop condition while the cycle runs; SIGHUP reloads and resets
async fn stream(controller: &LifecycleController, args: &RunArgs) -> Result<()> {
    let services = controller.services();
    let mut state = controller.subscribe();

    let stats_every = Duration::from_secs(args.stats_interval.max(1));
    let mut stats_tick = interval_at(Instant::now() + stats_every, stats_every);

    let deadline = async {
        match args.duration {
            0 => std::future::pending::<()>().await,
            secs => tokio::time::sleep(Duration::from_secs(secs)).await,
        }
    };
    tokio::pin!(deadline);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    #[cfg(unix)]
    let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        .context("Failed to install SIGHUP handler")?;

    info!("Streaming");
    loop {
        #[cfg(unix)]
        let reload = hangup.recv();
        #[cfg(not(unix))]
        let reload = std::future::pending::<Option<()>>();

        tokio::select! {
            result = &mut shutdown => {
                result?;
                warn!("Received shutdown signal, stopping driver...");
                return Ok(());
            }
            _ = &mut deadline => {
                info!(seconds = args.duration, "Run duration reached");
                return Ok(());
            }
            Some(()) = reload => {
                reload_and_reset(&services, &args.sensor).await;
            }
            _ = stats_tick.tick(), if args.stats_interval > 0 => {
                log_stats(controller);
            }
            changed = state.changed() => {
                let current = *state.borrow_and_update();
                if changed.is_err() || current != LifecycleState::Active {
                    error!(state = %current, "Driver left Active");
                    return Err(CliError::DriverStopped { state: current }.into());
                }
            }
        }
    }
}

/// Re-read parameters and re-handshake; failures leave the running stream untouched
async fn reload_and_reset(services: &ServiceHandle, args: &SensorArgs) {
    info!("SIGHUP received, reloading parameters");
    let blueprint = match load_blueprint(args) {
        Ok(blueprint) => blueprint,
        Err(e) => {
            warn!(error = %e, "Reload failed, keeping current parameters");
            return;
        }
    };
    if let Err(e) = services.set_parameters(blueprint.driver) {
        warn!(error = %e, "Cannot apply parameters");
        return;
    }
    match services.reset().await {
        Ok(()) => {
            if let Some(metadata) = services.get_metadata() {
                info!(
                    serial = %metadata.sensor_info.prod_sn,
                    mode = %metadata.lidar_mode,
                    "Sensor reset"
                );
            }
        }
        Err(e) => warn!(error = %e, fatal = e.is_fatal(), "Sensor reset failed"),
    }
}

fn log_stats(controller: &LifecycleController) {
    let stats = controller.stats();
    info!(
        cycles = stats.cycle.cycles,
        skipped = stats.cycle.skipped_cycles,
        frames = stats.cycle.frames_published,
        incomplete = stats.cycle.incomplete_frames,
        imu = stats.cycle.imu_published,
        datagrams = stats.source.map(|s| s.datagrams_received).unwrap_or(0),
        malformed = stats.source.map(|s| s.datagrams_dropped).unwrap_or(0),
        messages = stats.dispatcher.map(|d| d.published).unwrap_or(0),
        sink_drops = stats.dispatcher.map(|d| d.dropped).unwrap_or(0),
        "Driver stats"
    );
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
