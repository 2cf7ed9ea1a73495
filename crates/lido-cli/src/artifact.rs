use std::{
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

/// Deployment artifact loading errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ArtifactError {
    /// IO-related error.
    Io(io::Error),

    /// Artifact JSON parsing error.
    Json(serde_json::Error),
}

/// Information about a single deployed Aragon application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AppInfo {
    /// Address of the application implementation contract.
    #[serde(rename = "baseAddress")]
    pub base_address: String,

    /// ENS name of the application, including the APM registry domain.
    #[serde(rename = "fullName")]
    pub full_name: String,

    /// Short application name.
    pub name: String,

    /// Application identifier (namehash of the full name).
    pub id: String,

    /// IPFS content identifier of the application frontend.
    #[serde(rename = "ipfsCid")]
    pub ipfs_cid: String,

    /// Content URI registered in the APM repository.
    #[serde(rename = "contentURI")]
    pub content_uri: String,

    /// Address of the application proxy installed in the DAO.
    #[serde(rename = "proxyAddress")]
    pub proxy_address: String,
}

/// Deployment artifact produced by the deployment scripts.
///
/// Only the fields consumed by the CLI are represented, the rest of the file is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DeployedFile {
    /// Address of the deployed DAO kernel.
    #[serde(rename = "daoAddress")]
    pub dao_address: String,

    /// Lido application.
    #[serde(rename = "app:lido")]
    pub app_lido: AppInfo,

    /// Oracle application.
    #[serde(rename = "app:oracle")]
    pub app_oracle: AppInfo,

    /// Node operators registry application.
    #[serde(rename = "app:node-operators-registry")]
    pub app_node_operators_registry: AppInfo,
}

impl DeployedFile {
    /// Read the deployment artifact from `path`.
    pub(crate) fn load(path: &Path) -> Result<Self, ArtifactError> {
        let file = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(file)?)
    }

    /// Iterate over deployed applications along with their artifact keys.
    pub(crate) fn apps(&self) -> impl Iterator<Item = (&'static str, &AppInfo)> {
        [
            ("app:lido", &self.app_lido),
            ("app:oracle", &self.app_oracle),
            (
                "app:node-operators-registry",
                &self.app_node_operators_registry,
            ),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::{json, Value};

    use super::{ArtifactError, DeployedFile};

    fn app(name: &str, index: u8) -> Value {
        json!({
            "baseAddress": format!("0x{index:040x}"),
            "fullName": format!("{name}.lidopm.eth"),
            "name": name,
            "id": format!("0x{index:064x}"),
            "ipfsCid": format!("Qm{name}"),
            "contentURI": format!("0x697066733a516d{index:02x}"),
            "proxyAddress": format!("0x{:040x}", index + 100),
        })
    }

    fn artifact() -> Value {
        json!({
            "networkId": 1337,
            "ensAddress": "0x5f6f7e8cc7346a11ca2def8f827b7a0b612c56a1",
            "daoAddress": "0x2d7b1e4b5ae3dcfa4b4c6a4b2e6aee8cbbd4e0c2",
            "app:lido": app("lido", 1),
            "app:oracle": app("oracle", 2),
            "app:node-operators-registry": app("node-operators-registry", 3),
        })
    }

    #[test]
    fn load_ignores_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&mut file, &artifact()).unwrap();
        file.flush().unwrap();

        let deployed = DeployedFile::load(file.path()).unwrap();

        assert_eq!(
            deployed.dao_address,
            "0x2d7b1e4b5ae3dcfa4b4c6a4b2e6aee8cbbd4e0c2"
        );
        assert_eq!(deployed.app_oracle.full_name, "oracle.lidopm.eth");
        assert_eq!(
            deployed.app_node_operators_registry.proxy_address,
            format!("0x{:040x}", 103)
        );
        assert_eq!(
            deployed.apps().map(|(key, _)| key).collect::<Vec<_>>(),
            ["app:lido", "app:oracle", "app:node-operators-registry"]
        );
    }

    #[test]
    fn serialized_keys_match_artifact_schema() {
        let deployed: DeployedFile = serde_json::from_value(artifact()).unwrap();

        let mut expected = artifact();
        let object = expected.as_object_mut().unwrap();
        object.remove("networkId");
        object.remove("ensAddress");

        assert_eq!(serde_json::to_value(&deployed).unwrap(), expected);
    }

    #[test]
    fn missing_app_is_rejected() {
        let mut value = artifact();
        value.as_object_mut().unwrap().remove("app:oracle");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&mut file, &value).unwrap();
        file.flush().unwrap();

        assert!(matches!(
            DeployedFile::load(file.path()),
            Err(ArtifactError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            DeployedFile::load(&dir.path().join("deployed-localhost.json")),
            Err(ArtifactError::Io(_))
        ));
    }
}
