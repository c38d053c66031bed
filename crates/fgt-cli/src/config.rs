//! Configuration file handling for fgt-cli

use anyhow::{Context, Result};
use clap::ValueEnum;
use fgt_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// Default inventory file, relative to the working directory
pub const DEFAULT_INVENTORY: &str = "firewalls.csv";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Accept self-signed certificates
    pub insecure: Option<bool>,
    /// Management HTTPS port
    pub port: Option<u16>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Inventory file for `upgrade`
    pub inventory: Option<PathBuf>,
    /// Directory for configuration backups
    pub backup_dir: Option<PathBuf>,
    /// Refuse to upload when the backup fails
    pub require_backup: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the default config file, if there is one
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("fgt-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        insecure: bool,
        port: Option<u16>,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> Result<MergedConfig> {
        let output = match output {
            Some(format) => format,
            None => match &self.output {
                Some(name) => OutputFormat::from_str(name, true).map_err(|e| {
                    anyhow::anyhow!("Invalid output format '{}' in config file: {}", name, e)
                })?,
                None => OutputFormat::default(),
            },
        };

        Ok(MergedConfig {
            insecure: insecure || self.insecure.unwrap_or(false),
            port: port.or(self.port),
            output,
            no_color: no_color || self.no_color.unwrap_or(false),
            inventory: self
                .inventory
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY)),
            backup_dir: self.backup_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            require_backup: self.require_backup.unwrap_or(false),
            request_timeout_secs: self.request_timeout_secs,
            upload_timeout_secs: self.upload_timeout_secs,
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub insecure: bool,
    pub port: Option<u16>,
    pub output: OutputFormat,
    pub no_color: bool,
    pub inventory: PathBuf,
    pub backup_dir: PathBuf,
    pub require_backup: bool,
    pub request_timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
}

impl MergedConfig {
    /// Connection settings for every device contacted in this run
    pub fn client_config(&self) -> ClientConfig {
        let mut builder = ClientConfig::builder().insecure(self.insecure);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout_ms(secs.saturating_mul(1000));
        }
        if let Some(secs) = self.upload_timeout_secs {
            builder = builder.upload_timeout_ms(secs.saturating_mul(1000));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let merged = Config::default()
            .merge_with_args(false, None, None, false)
            .unwrap();
        assert!(!merged.insecure);
        assert_eq!(merged.output, OutputFormat::Table);
        assert_eq!(merged.inventory, PathBuf::from("firewalls.csv"));
        assert!(!merged.client_config().insecure);
    }

    #[test]
    fn test_file_values_and_cli_precedence() {
        let config: Config = toml::from_str(
            r#"
insecure = true
port = 8443
output = "json"
inventory = "/etc/fgt/fleet.csv"
upload_timeout_secs = 600
"#,
        )
        .unwrap();

        let merged = config
            .merge_with_args(false, Some(10443), Some(OutputFormat::Csv), false)
            .unwrap();
        assert!(merged.insecure);
        assert_eq!(merged.port, Some(10443));
        assert_eq!(merged.output, OutputFormat::Csv);
        assert_eq!(merged.inventory, PathBuf::from("/etc/fgt/fleet.csv"));

        let client = merged.client_config();
        assert_eq!(client.port, Some(10443));
        assert_eq!(client.timeouts.upload_ms, 600_000);
    }

    #[test]
    fn test_bad_output_format_in_file() {
        let config = Config {
            output: Some("yaml".into()),
            ..Config::default()
        };
        assert!(config.merge_with_args(false, None, None, false).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backup_dir = \"/var/backups/fgt\"\nrequire_backup = true\n").unwrap();

        let merged = Config::load_from(&path)
            .unwrap()
            .merge_with_args(false, None, None, false)
            .unwrap();
        assert_eq!(merged.backup_dir, PathBuf::from("/var/backups/fgt"));
        assert!(merged.require_backup);

        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_huge_timeouts_saturate() {
        let config = Config {
            request_timeout_secs: Some(u64::MAX),
            upload_timeout_secs: Some(u64::MAX / 10),
            ..Config::default()
        };
        let client = config
            .merge_with_args(false, None, None, false)
            .unwrap()
            .client_config();
        assert_eq!(client.timeouts.request_ms, u64::MAX);
        assert_eq!(client.timeouts.upload_ms, u64::MAX);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<Config>("verify_tls = false").is_err());
    }
}
