use std::{io, time::Duration};

use common::config;
use derive_more::{Display, Error, From};
use tokio::{process::Command, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    console::{Console, Status},
    process::{OutputSample, OutputSampler, ProcessHandle},
};

/// Text printed to the standard output once the daemon accepts requests.
const READY_MARKER: &str = "Daemon is ready";

/// Text printed to the standard error when the daemon is unable to start.
const ERROR_MARKER: &str = "Error:";

/// IPFS daemon launcher errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum IpfsError {
    /// IO-related error.
    Io(io::Error),

    /// IPFS binary could not be found.
    #[display(fmt = "unable to locate {}: {}", program, source)]
    #[from(ignore)]
    Which {
        /// Configured program name.
        program: String,

        /// Lookup error.
        source: which::Error,
    },

    /// Daemon process is already running.
    #[display(fmt = "IPFS daemon is already running")]
    AlreadyRunning,

    /// Daemon process could not be spawned.
    #[display(fmt = "unable to start IPFS daemon: {}", _0)]
    #[from(ignore)]
    Launch(io::Error),

    /// Daemon reported an error before becoming ready.
    #[display(fmt = "IPFS daemon failed to start")]
    #[from(ignore)]
    Failed {
        /// Error output of the daemon.
        #[error(ignore)]
        stderr: String,
    },

    /// Daemon did not become ready in time.
    #[display(fmt = "IPFS daemon is not ready after {} checks", attempts)]
    #[from(ignore)]
    Timeout {
        /// Number of performed readiness checks.
        #[error(ignore)]
        attempts: u32,
    },
}

/// Daemon readiness derived from a single output sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Daemon is ready to accept requests.
    Ready,

    /// Daemon reported an error.
    Failed,

    /// Nothing conclusive was printed.
    Unknown,
}

/// Classify daemon output sampled during startup.
///
/// The readiness marker takes precedence over the error marker.
pub(crate) fn classify(sample: &OutputSample) -> Readiness {
    if String::from_utf8_lossy(&sample.stdout).contains(READY_MARKER) {
        Readiness::Ready
    } else if String::from_utf8_lossy(&sample.stderr).contains(ERROR_MARKER) {
        Readiness::Failed
    } else {
        Readiness::Unknown
    }
}

/// Readiness polling parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PollPolicy {
    /// Delay between two samples.
    pub interval: Duration,

    /// Total number of samples.
    pub attempts: u32,
}

impl From<&config::Ipfs> for PollPolicy {
    fn from(config: &config::Ipfs) -> Self {
        Self {
            interval: config.poll_interval(),
            attempts: config.poll_attempts,
        }
    }
}

/// Sample `sampler` until the daemon is either ready or failed.
///
/// Output that did not match any marker is discarded before the next sample.
/// Returns [`IpfsError::Timeout`] once `policy.attempts` samples are exhausted.
pub(crate) async fn await_readiness<S: OutputSampler>(
    sampler: &mut S,
    policy: PollPolicy,
    console: &Console,
    progress: &Status,
) -> Result<(), IpfsError> {
    for attempt in 1..=policy.attempts {
        let sample = sampler.drain();

        console.echo(progress, &sample.stdout)?;

        match classify(&sample) {
            Readiness::Ready => {
                debug!(attempt, "IPFS daemon is ready");
                return Ok(());
            }
            Readiness::Failed => {
                console.report(progress, &sample.stderr)?;
                return Err(IpfsError::Failed {
                    stderr: String::from_utf8_lossy(&sample.stderr).into_owned(),
                });
            }
            Readiness::Unknown => debug!(attempt, "IPFS daemon is not ready yet"),
        }

        sleep(policy.interval).await;
    }

    Err(IpfsError::Timeout {
        attempts: policy.attempts,
    })
}

/// Lifecycle state of an [`IpfsDaemon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DaemonState {
    /// Daemon was never started.
    Idle,

    /// Daemon process is running, readiness is being checked.
    Starting,

    /// Daemon is ready to accept requests.
    Ready,

    /// Daemon could not be started.
    Failed,

    /// Daemon was stopped.
    Stopped,
}

/// Local IPFS daemon.
///
/// The daemon process is owned by the launcher and is killed when the launcher is dropped.
pub(crate) struct IpfsDaemon<'a> {
    /// Daemon configuration.
    config: &'a config::Ipfs,

    /// Operator console.
    console: &'a Console,

    /// Daemon process.
    handle: ProcessHandle,

    /// Current lifecycle state.
    state: DaemonState,
}

impl<'a> IpfsDaemon<'a> {
    /// Create new idle launcher.
    pub(crate) fn new(config: &'a config::Ipfs, console: &'a Console) -> Self {
        Self {
            config,
            console,
            handle: ProcessHandle::default(),
            state: DaemonState::Idle,
        }
    }

    /// Current lifecycle state.
    pub(crate) fn state(&self) -> DaemonState {
        self.state
    }

    /// Check whether the daemon process is recorded as running.
    pub(crate) fn is_running(&self) -> bool {
        self.handle.is_active()
    }

    /// Start the daemon and wait until it is ready.
    ///
    /// If the daemon reports an error, its process is left running until
    /// [`stop`](IpfsDaemon::stop) is called or the launcher is dropped.
    /// Returns [`IpfsError::AlreadyRunning`] without changing the state if a
    /// daemon process is already recorded.
    pub(crate) async fn start(&mut self) -> Result<(), IpfsError> {
        if self.handle.is_active() {
            return Err(IpfsError::AlreadyRunning);
        }

        let progress = self.console.status("IPFS: Starting...");

        self.state = DaemonState::Starting;

        match self.launch(&progress).await {
            Ok(()) => {
                self.state = DaemonState::Ready;
                info!("IPFS daemon started");
                progress.success("IPFS: Started");
                Ok(())
            }
            Err(error) => {
                self.state = DaemonState::Failed;
                warn!(%error, "IPFS daemon failed to start");

                if let IpfsError::Timeout { .. } = error {
                    progress.update_text("Timeout error");
                }

                progress.fail();
                Err(error)
            }
        }
    }

    /// Spawn the daemon process and poll its output.
    async fn launch(&mut self, progress: &Status) -> Result<(), IpfsError> {
        let program = which::which(&self.config.program).map_err(|source| IpfsError::Which {
            program: self.config.program.clone(),
            source,
        })?;

        let mut command = Command::new(program);
        command.args(&self.config.args);

        self.handle.spawn(&mut command).map_err(IpfsError::Launch)?;

        await_readiness(
            &mut self.handle,
            PollPolicy::from(self.config),
            self.console,
            progress,
        )
        .await
    }

    /// Stop the daemon.
    ///
    /// Does nothing if no daemon process is recorded.
    pub(crate) async fn stop(&mut self) -> Result<(), IpfsError> {
        if !self.handle.is_active() {
            return Ok(());
        }

        let progress = self.console.status("IPFS: Stopping...");

        if let Err(error) = self.handle.kill().await {
            progress.fail();
            return Err(error.into());
        }

        self.state = DaemonState::Stopped;
        info!(status = ?self.handle.status(), "IPFS daemon stopped");
        progress.success("IPFS: Stopped");

        Ok(())
    }
}
