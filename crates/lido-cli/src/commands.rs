/// `artifact` subcommand.
mod artifact;

/// `deploy` subcommand.
mod deploy;

/// `ipfs` subcommand.
mod ipfs;

/// `start` subcommand.
mod start;

pub(crate) use artifact::artifact;
pub(crate) use deploy::deploy;
pub(crate) use ipfs::ipfs;
pub(crate) use start::start;

use std::{future::Future, io, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use common::config::DEFAULT_CONFIG_FILE;
use derive_more::{Display, Error, From};
use tokio::signal;

use crate::{
    artifact::ArtifactError,
    deploy::{DeployError, Stage},
    ipfs::IpfsError,
};

/// CLI configuration.
#[derive(Parser)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Configuration file path.
    #[arg(short, long = "config", global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: Option<PathBuf>,

    /// Print the output of external commands.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Deploy the Aragon environment, Lido applications and the DAO.
    Deploy(Deploy),

    /// Start the local IPFS daemon and keep it running until interrupted.
    Ipfs,

    /// Start the local IPFS daemon and run the full deployment.
    Start(Start),

    /// Show the deployment artifact.
    Artifact(Artifact),
}

/// `deploy` subcommand configuration.
#[derive(Args)]
pub struct Deploy {
    /// Run a single deployment stage instead of the full pipeline.
    #[arg(short, long, value_enum)]
    stage: Option<Stage>,

    /// Remove the deployment artifact left from a previous run before deploying.
    #[arg(short, long)]
    fresh: bool,
}

/// `start` subcommand configuration.
#[derive(Args)]
pub struct Start {
    /// Remove the deployment artifact left from a previous run before deploying.
    #[arg(short, long)]
    fresh: bool,

    /// Keep the IPFS daemon running after a successful deployment, until interrupted.
    #[arg(short, long)]
    keep_ipfs: bool,
}

/// `artifact` subcommand configuration.
#[derive(Args)]
pub struct Artifact {
    /// Deployment artifact path, defaults to the configured one.
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Print the artifact as JSON instead of a summary.
    #[arg(short, long)]
    json: bool,
}

/// Subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum CommandError {
    /// IO-related error.
    Io(io::Error),

    /// Deployment pipeline error.
    Deploy(DeployError),

    /// IPFS daemon error.
    Ipfs(IpfsError),

    /// Unable to load the deployment artifact.
    #[display(fmt = "unable to load deployment artifact: {}", _0)]
    Artifact(ArtifactError),

    /// JSON serialization error.
    Json(serde_json::Error),

    /// Operator interrupted the CLI.
    #[display(fmt = "interrupted")]
    Interrupted,
}

/// Drive `future` to completion, unless the operator presses Ctrl-C first.
///
/// On interruption `future` is dropped, which kills every process it owns.
async fn interruptible<T, E>(
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, CommandError>
where
    CommandError: From<E>,
{
    tokio::select! {
        result = future => Ok(result?),
        result = signal::ctrl_c() => {
            result?;
            Err(CommandError::Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands};
    use crate::deploy::Stage;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_single_stage_deploy() {
        let cli = Cli::try_parse_from([
            "lido-cli",
            "deploy",
            "--stage",
            "aragon-env",
            "--fresh",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config_file.unwrap().to_str(), Some("Lido.toml"));

        let Commands::Deploy(deploy) = cli.command else {
            panic!("expected deploy subcommand");
        };
        assert_eq!(deploy.stage, Some(Stage::AragonEnv));
        assert!(deploy.fresh);
    }

    #[test]
    fn parse_start_with_config() {
        for args in [
            ["lido-cli", "-c", "devnet.toml", "start", "--keep-ipfs"],
            ["lido-cli", "--config", "devnet.toml", "start", "--keep-ipfs"],
            ["lido-cli", "start", "-c", "devnet.toml", "--keep-ipfs"],
            ["lido-cli", "start", "--keep-ipfs", "--config", "devnet.toml"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();

            assert!(!cli.verbose);
            assert_eq!(cli.config_file.unwrap().to_str(), Some("devnet.toml"));

            let Commands::Start(start) = cli.command else {
                panic!("expected start subcommand");
            };
            assert!(start.keep_ipfs);
            assert!(!start.fresh);
        }
    }

    #[test]
    fn config_flag_applies_to_every_subcommand() {
        let cli = Cli::try_parse_from(["lido-cli", "--config", "devnet.toml", "ipfs"]).unwrap();
        assert_eq!(cli.config_file.unwrap().to_str(), Some("devnet.toml"));

        let cli = Cli::try_parse_from(["lido-cli", "artifact", "-c", "devnet.toml"]).unwrap();
        assert_eq!(cli.config_file.unwrap().to_str(), Some("devnet.toml"));
        assert!(matches!(cli.command, Commands::Artifact(_)));

        let legacy = Cli::try_parse_from(["lido-cli", "--config-file", "devnet.toml", "ipfs"]);
        assert!(legacy.is_err());
    }

    #[test]
    fn stage_names() {
        for (name, stage) in [
            ("aragon-std-apps", Stage::AragonStdApps),
            ("apm-and-templates", Stage::ApmAndTemplates),
            ("deploy-apps", Stage::DeployApps),
            ("deploy-dao", Stage::DeployDao),
        ] {
            let cli = Cli::try_parse_from(["lido-cli", "deploy", "--stage", name]).unwrap();
            let Commands::Deploy(deploy) = cli.command else {
                panic!("expected deploy subcommand");
            };
            assert_eq!(deploy.stage, Some(stage));
        }
    }
}
