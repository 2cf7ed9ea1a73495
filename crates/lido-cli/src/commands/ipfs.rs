use common::config::Config;
use tokio::signal;

use crate::{
    commands::{interruptible, CommandError},
    console::Console,
    ipfs::IpfsDaemon,
};

/// Start the IPFS daemon and keep it running until the operator presses Ctrl-C.
pub(crate) async fn ipfs(config: &Config, console: &Console) -> Result<(), CommandError> {
    let mut daemon = IpfsDaemon::new(&config.ipfs, console);

    interruptible(daemon.start()).await?;

    console.println("IPFS daemon is running, press Ctrl-C to stop it.")?;
    signal::ctrl_c().await?;

    daemon.stop().await?;

    Ok(())
}
