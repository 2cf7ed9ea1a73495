use common::config::Config;

use crate::{
    commands::{artifact::report_artifact, interruptible, CommandError, Deploy},
    console::Console,
    deploy::Deployer,
};

/// Deploy flow entrypoint.
pub(crate) async fn deploy(
    Deploy { stage, fresh }: Deploy,
    config: &Config,
    console: &Console,
) -> Result<(), CommandError> {
    let mut deployer = Deployer::new(&config.deploy, console)?;

    if fresh {
        deployer.clean()?;
    }

    match stage {
        Some(stage) => interruptible(deployer.run_stage(stage)).await?,
        None => {
            interruptible(deployer.start()).await?;
            report_artifact(&config.deploy, console)?;
        }
    }

    Ok(())
}
