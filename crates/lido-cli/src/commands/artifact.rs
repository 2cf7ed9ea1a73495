use std::io;

use common::config::{self, Config};
use tracing::warn;

use crate::{
    artifact::{ArtifactError, DeployedFile},
    commands::{Artifact, CommandError},
    console::Console,
};

/// Print the deployment artifact.
pub(crate) fn artifact(
    Artifact { path, json }: Artifact,
    config: &Config,
    console: &Console,
) -> Result<(), CommandError> {
    let path = path.unwrap_or_else(|| config.deploy.artifact_path());
    let deployed = DeployedFile::load(&path)?;

    if json {
        console.println(serde_json::to_string_pretty(&deployed)?)?;
    } else {
        print_summary(&deployed, console)?;
    }

    Ok(())
}

/// Print the summary of a freshly produced deployment artifact, if there is one.
pub(super) fn report_artifact(
    config: &config::Deploy,
    console: &Console,
) -> Result<(), CommandError> {
    let path = config.artifact_path();

    match DeployedFile::load(&path) {
        Ok(deployed) => Ok(print_summary(&deployed, console)?),
        Err(ArtifactError::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "deployment artifact not found");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

/// Print addresses and identifiers of the deployed DAO and applications.
fn print_summary(deployed: &DeployedFile, console: &Console) -> io::Result<()> {
    console.println(format!("DAO address: {}", deployed.dao_address))?;

    for (key, app) in deployed.apps() {
        console.println(key)?;
        console.println(format!("  name:           {} ({})", app.name, app.full_name))?;
        console.println(format!("  id:             {}", app.id))?;
        console.println(format!("  proxy:          {}", app.proxy_address))?;
        console.println(format!("  implementation: {}", app.base_address))?;
        console.println(format!("  ipfs:           {}", app.ipfs_cid))?;
        console.println(format!("  content URI:    {}", app.content_uri))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use common::config;

    use super::report_artifact;
    use crate::console::Console;

    const ARTIFACT: &str = r#"{
        "daoAddress": "0xdao",
        "app:lido": {
            "baseAddress": "0xlido-base", "fullName": "lido.lidopm.eth", "name": "lido",
            "id": "0xlido-id", "ipfsCid": "QmLido", "contentURI": "0xlido-uri",
            "proxyAddress": "0xlido-proxy"
        },
        "app:oracle": {
            "baseAddress": "0xoracle-base", "fullName": "oracle.lidopm.eth", "name": "oracle",
            "id": "0xoracle-id", "ipfsCid": "QmOracle", "contentURI": "0xoracle-uri",
            "proxyAddress": "0xoracle-proxy"
        },
        "app:node-operators-registry": {
            "baseAddress": "0xnor-base", "fullName": "node-operators-registry.lidopm.eth",
            "name": "node-operators-registry", "id": "0xnor-id", "ipfsCid": "QmNor",
            "contentURI": "0xnor-uri", "proxyAddress": "0xnor-proxy"
        }
    }"#;

    fn deploy_config(dir: &std::path::Path) -> config::Deploy {
        config::Deploy {
            project_dir: Some(dir.to_path_buf()),
            ..config::Deploy::default()
        }
    }

    #[test]
    fn summary_lists_every_app() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("deployed-localhost.json"), ARTIFACT).unwrap();
        let (console, output) = Console::captured(false);

        report_artifact(&deploy_config(dir.path()), &console).unwrap();

        let summary = String::from_utf8(output.stdout()).unwrap();
        assert!(summary.starts_with("DAO address: 0xdao\napp:lido\n"));
        assert!(summary.contains("  proxy:          0xoracle-proxy\n"));
        assert!(summary.contains(
            "  name:           node-operators-registry (node-operators-registry.lidopm.eth)\n"
        ));
    }

    #[test]
    fn missing_artifact_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (console, output) = Console::captured(false);

        report_artifact(&deploy_config(dir.path()), &console).unwrap();

        assert!(output.stdout().is_empty());
    }

    #[test]
    fn malformed_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("deployed-localhost.json"), "{\"daoAddress\": 1}").unwrap();
        let (console, _) = Console::captured(false);

        assert!(report_artifact(&deploy_config(dir.path()), &console).is_err());
    }
}
