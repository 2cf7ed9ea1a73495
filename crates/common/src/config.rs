use std::{path::PathBuf, time::Duration};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "Lido.toml";

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
///
/// [`FromStr`]: std::str::FromStr
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Deployment pipeline configuration.
#[derive(Deserialize)]
pub struct Deploy {
    /// Program that runs the deployment scripts, resolved through `PATH`.
    #[serde(default = "default_runner")]
    pub runner: String,

    /// Directory in which deployment scripts are executed.
    ///
    /// When unset, scripts inherit the working directory of the CLI.
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Deployment artifact written by the scripts.
    ///
    /// Relative paths are resolved against [`Deploy::project_dir`].
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
}

impl Default for Deploy {
    fn default() -> Self {
        Self {
            runner: default_runner(),
            project_dir: None,
            artifact: default_artifact(),
        }
    }
}

impl Deploy {
    /// Location of the deployment artifact file.
    pub fn artifact_path(&self) -> PathBuf {
        match &self.project_dir {
            Some(dir) if self.artifact.is_relative() => dir.join(&self.artifact),
            _ => self.artifact.clone(),
        }
    }

    /// Artifact file name as shown to the operator.
    pub fn artifact_name(&self) -> String {
        self.artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.artifact.display().to_string())
    }
}

/// IPFS daemon configuration.
#[derive(Deserialize)]
pub struct Ipfs {
    /// IPFS binary, resolved through `PATH`.
    #[serde(default = "default_ipfs_program")]
    pub program: String,

    /// Arguments used to start the daemon.
    #[serde(default = "default_ipfs_args")]
    pub args: Vec<String>,

    /// Delay between daemon readiness checks, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Number of readiness checks before the daemon start is considered timed out.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
}

impl Default for Ipfs {
    fn default() -> Self {
        Self {
            program: default_ipfs_program(),
            args: default_ipfs_args(),
            poll_interval: default_poll_interval(),
            poll_attempts: default_poll_attempts(),
        }
    }
}

impl Ipfs {
    /// Delay between daemon readiness checks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}

// Default values used for deployment and IPFS configuration.
// Readiness is checked once per second, for ten seconds in total.
fn default_runner() -> String {
    String::from("yarn")
}

fn default_artifact() -> PathBuf {
    PathBuf::from("deployed-localhost.json")
}

fn default_ipfs_program() -> String {
    String::from("ipfs")
}

fn default_ipfs_args() -> Vec<String> {
    vec![String::from("daemon")]
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_poll_attempts() -> u32 {
    10
}

/// General configuration.
#[derive(Default, Deserialize)]
pub struct Config {
    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Deployment pipeline configuration.
    #[serde(default)]
    pub deploy: Deploy,

    /// IPFS daemon configuration.
    #[serde(default)]
    pub ipfs: Ipfs,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// Nested keys are separated with a double underscore, for example
    /// `LIDO_IPFS__POLL_ATTEMPTS=20`.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(
                path.unwrap_or(PathBuf::from(DEFAULT_CONFIG_FILE)),
            ))
            .merge(Env::prefixed("LIDO_").split("__"))
            .extract()
    }

    /// Create new config suitable for running unit tests.
    ///
    /// Readiness polling is shortened so that tests driving real processes finish quickly.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            ipfs: Ipfs {
                poll_interval: 20,
                poll_attempts: 250,
                ..Ipfs::default()
            },
            ..Self::default()
        }
    }
}
