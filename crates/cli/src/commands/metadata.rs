//! `metadata` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::MetadataArgs;
use crate::commands::sensor::{build_controller, load_blueprint};
use crate::error::CliError;

/// Configure once, print the handshake metadata, shut down
pub async fn run_metadata(args: &MetadataArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.sensor)?;
    let mut controller = build_controller(&args.sensor, &blueprint);

    let configured = controller.configure().await.context("Configure failed");
    let metadata = controller.metadata();
    controller.shutdown().await.context("Shutdown failed")?;
    configured?;

    let metadata = metadata.ok_or(CliError::MetadataUnavailable)?;
    let json =
        serde_json::to_string_pretty(metadata.as_ref()).context("Failed to serialize metadata")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Metadata written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
