//! # Local Lido DAO environment
//!
//! `lido-cli` prepares a local development environment for the Lido DAO:
//! it starts an IPFS daemon and runs the deployment scripts of the DAO repository.
//!
//! # Deployment pipeline
//!
//! Deployment consists of five stages, executed in a fixed order since each stage
//! relies on the on-chain state created by the previous ones. Every stage is a package
//! script launched through the configured runner (`yarn` by default) and run to completion.
//! The pipeline stops at the first failed stage. See the [`deploy`] module.
//!
//! # IPFS daemon
//!
//! The daemon is started in the background, and its output is sampled periodically
//! until it either reports readiness or an error. The daemon process is owned by the
//! CLI and is terminated when the CLI exits. See the [`ipfs`] module.
//!
//! # Configuration
//!
//! Configuration is loaded from the `Lido.toml` file and `LIDO_`-prefixed environment
//! variables, see [`common::config::Config`].

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use clap::Parser;
use commands::{Cli, Commands};
use common::{config::Config, logging};
use console::Console;

/// Deployment artifact representation.
mod artifact;

/// CLI subcommands.
mod commands;

/// Operator console output.
mod console;

/// Deployment pipeline.
mod deploy;

/// IPFS daemon launcher.
mod ipfs;

/// External process management.
mod process;

/// CLI entrypoint.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = Config::new(cli.config_file)?;

    logging::init(&config);

    let console = Console::new(cli.verbose);

    match cli.command {
        Commands::Deploy(args) => commands::deploy(args, &config, &console).await?,
        Commands::Ipfs => commands::ipfs(&config, &console).await?,
        Commands::Start(args) => commands::start(args, &config, &console).await?,
        Commands::Artifact(args) => commands::artifact(args, &config, &console)?,
    }

    Ok(())
}
