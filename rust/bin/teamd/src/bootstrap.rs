//! Bootstrap — start-up checks.
//!
//! `teamd serve` refuses to start when the deployment account is unknown:
//! without it the directory cannot tell whether the management account
//! must be hidden from OU expansion.

use std::path::Path;

use team_core::ServiceConfig;

/// Verify server configuration is ready for use.
pub fn verify_config(config: &ServiceConfig) -> anyhow::Result<()> {
    if config.deployment.account_id.trim().is_empty() {
        anyhow::bail!(
            "No deployment account id in configuration.\n\
             Set [deployment] account_id or pass --account-id=<id>."
        );
    }
    if config.storage.data_dir.is_none()
        && (config.storage.db.is_none() || config.storage.sqlite.is_none())
    {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.directory.page_size == 0 {
        anyhow::bail!("directory.page_size must be at least 1.");
    }
    if let Some(endpoint) = &config.publish.endpoint {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            anyhow::bail!("publish.endpoint must be an http(s) URL, got '{}'", endpoint);
        }
    }
    Ok(())
}

/// Create the parent directory of a store file if needed.
pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> ServiceConfig {
        ServiceConfig::from_toml(toml).unwrap()
    }

    #[test]
    fn test_verify_config_ok() {
        let config = config(
            r#"
            [storage]
            data_dir = "/tmp/teamd"
            [deployment]
            account_id = "111111111111"
            "#,
        );
        assert!(verify_config(&config).is_ok());
    }

    #[test]
    fn test_verify_config_missing_account() {
        let config = config(
            r#"
            [storage]
            data_dir = "/tmp/teamd"
            "#,
        );
        assert!(verify_config(&config).is_err());
    }

    #[test]
    fn test_verify_config_missing_storage() {
        let config = config(
            r#"
            [deployment]
            account_id = "111111111111"
            "#,
        );
        assert!(verify_config(&config).is_err());
    }

    #[test]
    fn test_verify_config_bad_endpoint() {
        let config = config(
            r#"
            [storage]
            data_dir = "/tmp/teamd"
            [deployment]
            account_id = "111111111111"
            [publish]
            endpoint = "ftp://example.com"
            "#,
        );
        assert!(verify_config(&config).is_err());
    }
}
