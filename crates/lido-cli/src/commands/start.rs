use common::config::Config;
use tokio::signal;

use crate::{
    commands::{artifact::report_artifact, interruptible, CommandError, Start},
    console::Console,
    deploy::Deployer,
    ipfs::IpfsDaemon,
};

/// Full local environment setup: IPFS daemon followed by the deployment pipeline.
///
/// The daemon is stopped once the deployment finishes, successfully or not.
pub(crate) async fn start(
    Start { fresh, keep_ipfs }: Start,
    config: &Config,
    console: &Console,
) -> Result<(), CommandError> {
    let mut deployer = Deployer::new(&config.deploy, console)?;
    let mut daemon = IpfsDaemon::new(&config.ipfs, console);

    if fresh {
        deployer.clean()?;
    }

    interruptible(daemon.start()).await?;

    let deployment = interruptible(deployer.start()).await;

    if deployment.is_ok() {
        report_artifact(&config.deploy, console)?;

        if keep_ipfs {
            console.println("IPFS daemon is running, press Ctrl-C to stop it.")?;
            signal::ctrl_c().await?;
        }
    }

    daemon.stop().await?;

    deployment
}
