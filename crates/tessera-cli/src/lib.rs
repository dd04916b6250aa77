//! Tessera CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// Tessera - worker-pool compiler
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a Worker into machine deployments, classes and status
    Compile(commands::compile::CompileArgs),
    /// Print the Worker CustomResourceDefinition
    Crd,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Compile(args) => commands::compile::run(args).await,
            Commands::Crd => commands::crd::run(),
        }
    }
}
