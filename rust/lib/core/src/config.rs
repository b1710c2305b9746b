use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ServiceError;

/// Server configuration, read from a TOML file and optionally overridden
/// by `--key=value` command-line flags.
///
/// ```toml
/// listen = "0.0.0.0:8080"
///
/// [storage]
/// data_dir = "/var/lib/team"
///
/// [deployment]
/// account_id = "111111111111"
/// management_account_id = "999999999999"
///
/// [publish]
/// endpoint = "https://api.example.com/graphql"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen address for the HTTP server.
    pub listen: String,
    pub storage: StorageConfig,
    pub deployment: DeploymentConfig,
    pub directory: DirectoryConfig,
    pub publish: PublishConfig,
    pub tables: TablesConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for the embedded stores.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb directory snapshot.
    /// Defaults to `{data_dir}/directory.redb` if not specified.
    pub db: Option<PathBuf>,

    /// Path to the SQLite record store.
    /// Defaults to `{data_dir}/records.sqlite` if not specified.
    pub sqlite: Option<PathBuf>,
}

/// Identity of the account this service is deployed in.
///
/// Passed explicitly into the directory collaborator; OU expansion hides
/// the management account unless both ids are equal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub account_id: String,
    pub management_account_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Accounts fetched per directory page.
    pub page_size: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// GraphQL endpoint receiving aggregated entitlements. When unset,
    /// results are only logged.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Table holding eligibility policies.
    pub policies: String,
    /// Request table created at startup. Overlap queries name their own
    /// table and may point elsewhere.
    pub requests: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            policies: "policies".to_string(),
            requests: "requests".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            storage: StorageConfig::default(),
            deployment: DeploymentConfig::default(),
            directory: DirectoryConfig::default(),
            publish: PublishConfig::default(),
            tables: TablesConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Apply command-line overrides on top of the loaded values.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--db=PATH`
    /// - `--sqlite=PATH`
    /// - `--listen=ADDR`
    /// - `--account-id=ID`
    /// - `--management-account-id=ID`
    /// - `--publish-endpoint=URL`
    pub fn apply_args(mut self, args: &[String]) -> Self {
        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                self.storage.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--db=") {
                self.storage.db = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--sqlite=") {
                self.storage.sqlite = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--listen=") {
                self.listen = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--account-id=") {
                self.deployment.account_id = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--management-account-id=") {
                self.deployment.management_account_id = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--publish-endpoint=") {
                self.publish.endpoint = Some(val.to_string());
            }
        }
        self
    }

    /// Resolve the redb snapshot path, falling back to `{data_dir}/directory.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.storage
            .db
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("directory.redb"))
    }

    /// Resolve the SQLite path, falling back to `{data_dir}/records.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.storage
            .sqlite
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("records.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.storage
            .data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = ServiceConfig::from_toml(
            r#"
            listen = "127.0.0.1:9090"

            [storage]
            data_dir = "/tmp/team"

            [deployment]
            account_id = "111"
            management_account_id = "999"

            [directory]
            page_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:9090");
        assert_eq!(config.deployment.account_id, "111");
        assert_eq!(config.deployment.management_account_id.as_deref(), Some("999"));
        assert_eq!(config.directory.page_size, 5);
        assert_eq!(config.tables.policies, "policies");
        assert_eq!(config.tables.requests, "requests");
        assert!(config.publish.endpoint.is_none());
        assert_eq!(config.publish.timeout_secs, 10);
    }

    #[test]
    fn test_apply_args() {
        let args = vec![
            "--data-dir=/tmp/team".to_string(),
            "--account-id=222".to_string(),
            "--publish-endpoint=http://localhost:4000/graphql".to_string(),
        ];
        let config = ServiceConfig::default().apply_args(&args);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/team")));
        assert_eq!(config.deployment.account_id, "222");
        assert_eq!(
            config.publish.endpoint.as_deref(),
            Some("http://localhost:4000/graphql")
        );
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ServiceConfig {
            storage: StorageConfig {
                data_dir: Some(PathBuf::from("/data")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.resolve_db_path(), PathBuf::from("/data/directory.redb"));
        assert_eq!(
            config.resolve_sqlite_path(),
            PathBuf::from("/data/records.sqlite")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServiceConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teamd.toml");
        std::fs::write(&path, "[deployment]\naccount_id = \"333\"\n").unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.deployment.account_id, "333");
        assert_eq!(config.listen, "0.0.0.0:8080");
    }
}
