use std::{fs, io, path::PathBuf, process::ExitStatus};

use clap::ValueEnum;
use common::config;
use derive_more::{Display, Error, From};
use tokio::process::Command;
use tracing::{info, warn};

use crate::{console::Console, process::ProcessHandle};

/// Error text printed by the Aragon environment script when a stale artifact
/// points to an ENS instance which no longer exists on the local chain.
const ENS_INSTANCE_ERROR: &str = "Error: Cannot create instance of ENS";

/// Deployment pipeline stage.
///
/// Stages are executed in the declaration order, since each one relies on the
/// on-chain state created by the previous ones.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Stage {
    /// Aragon environment: ENS, DAO factory and APM registry.
    #[display(fmt = "Aragon env")]
    AragonEnv,

    /// Standard Aragon applications (agent, finance, voting, token manager).
    #[display(fmt = "Aragon standard apps")]
    AragonStdApps,

    /// Lido APM registry and DAO template.
    #[display(fmt = "apm and template")]
    ApmAndTemplates,

    /// Lido application contracts and frontends.
    #[display(fmt = "lido apps")]
    DeployApps,

    /// Lido DAO instance.
    #[display(fmt = "DAO")]
    DeployDao,
}

impl Stage {
    /// All stages, in execution order.
    pub(crate) const ALL: [Stage; 5] = [
        Stage::AragonEnv,
        Stage::AragonStdApps,
        Stage::ApmAndTemplates,
        Stage::DeployApps,
        Stage::DeployDao,
    ];

    /// Package script that implements this stage.
    pub(crate) fn script(self) -> &'static str {
        match self {
            Stage::AragonEnv => "deploy:aragon-env",
            Stage::AragonStdApps => "deploy:aragon-std-apps",
            Stage::ApmAndTemplates => "deploy:apm-and-template",
            Stage::DeployApps => "deploy:apps",
            Stage::DeployDao => "deploy:dao",
        }
    }
}

/// Deployment pipeline errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DeployError {
    /// IO-related error.
    Io(io::Error),

    /// Script runner could not be found.
    #[display(fmt = "unable to locate {}: {}", program, source)]
    #[from(ignore)]
    Which {
        /// Configured runner name.
        program: String,

        /// Lookup error.
        source: which::Error,
    },

    /// Stage process could not be launched.
    #[display(fmt = "unable to launch deployment stage '{}': {}", stage, source)]
    #[from(ignore)]
    Launch {
        /// Stage that was being launched.
        stage: Stage,

        /// Launch error.
        source: io::Error,
    },

    /// Stage process exited unsuccessfully.
    #[display(fmt = "{}", message)]
    #[from(ignore)]
    StageFailed {
        /// Failed stage.
        stage: Stage,

        /// Exit status of the stage process.
        status: ExitStatus,

        /// Message shown to the operator.
        message: String,
    },
}

/// Build the message shown to the operator when `stage` fails.
///
/// `artifact` is the name of the deployment artifact file, which has to be removed
/// when the Aragon environment cannot be reused.
pub(crate) fn failure_message(
    stage: Stage,
    status: ExitStatus,
    stderr: &str,
    artifact: &str,
) -> String {
    if stage == Stage::AragonEnv && stderr.contains(ENS_INSTANCE_ERROR) {
        format!("{ENS_INSTANCE_ERROR}, remove {artifact} file and try again")
    } else {
        format!("Deploy: {stage} failed ({status})")
    }
}

/// Deployment pipeline runner.
///
/// Stages run one at a time and share a single [`ProcessHandle`].
pub(crate) struct Deployer<'a> {
    /// Deployment configuration.
    config: &'a config::Deploy,

    /// Operator console.
    console: &'a Console,

    /// Resolved path to the script runner.
    runner: PathBuf,

    /// Handle reused by every stage.
    handle: ProcessHandle,
}

impl<'a> Deployer<'a> {
    /// Create new deployer, resolving the configured script runner.
    pub(crate) fn new(
        config: &'a config::Deploy,
        console: &'a Console,
    ) -> Result<Self, DeployError> {
        let runner = which::which(&config.runner).map_err(|source| DeployError::Which {
            program: config.runner.clone(),
            source,
        })?;

        Ok(Self {
            config,
            console,
            runner,
            handle: ProcessHandle::default(),
        })
    }

    /// Remove the deployment artifact left from a previous run.
    ///
    /// Returns `false` if there was nothing to remove.
    pub(crate) fn clean(&self) -> Result<bool, DeployError> {
        let path = self.config.artifact_path();

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed stale deployment artifact");
                Ok(true)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Run every stage in order, stopping at the first failure.
    pub(crate) async fn start(&mut self) -> Result<(), DeployError> {
        for stage in Stage::ALL {
            self.run_stage(stage).await?;
        }

        Ok(())
    }

    /// Run a single stage to completion.
    pub(crate) async fn run_stage(&mut self, stage: Stage) -> Result<(), DeployError> {
        let progress = self.console.status(format!("Deploy: {stage}..."));

        let mut command = Command::new(&self.runner);
        command.arg(stage.script());

        if let Some(project_dir) = &self.config.project_dir {
            command.current_dir(project_dir);
        }

        info!(%stage, script = stage.script(), "running deployment stage");

        let status = match self.handle.run(&mut command).await {
            Ok(status) => status,
            Err(source) => {
                progress.fail();
                return Err(DeployError::Launch { stage, source });
            }
        };

        if !status.success() {
            let stderr = self.handle.stderr();
            let message = failure_message(
                stage,
                status,
                &String::from_utf8_lossy(&stderr),
                &self.config.artifact_name(),
            );

            warn!(%stage, %status, "deployment stage failed");

            progress.update_text(message.clone());
            let reported = self.console.report(&progress, &stderr);
            progress.fail();
            reported?;

            return Err(DeployError::StageFailed {
                stage,
                status,
                message,
            });
        }

        if self.console.is_verbose() {
            let stdout = self.handle.take_stdout();
            self.console.echo(&progress, &stdout)?;
        }

        progress.success(format!("Deploy: {stage}... done"));

        Ok(())
    }
}
