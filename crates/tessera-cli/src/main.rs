//! Tessera CLI
//!
//! Compiles Worker resources into machine deployments and machine classes.

use clap::Parser;

use tessera_cli::{Cli, Result};
use tessera_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        json: cli.json_logs,
        ..Default::default()
    })?;

    cli.run().await
}
