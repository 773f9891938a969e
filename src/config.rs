//! Application configuration
//!
//! Priority (highest first):
//! 1. Command-line flags (applied by the binaries)
//! 2. Environment variables (`LOAN_APPROVAL_*`)
//! 3. TOML file: `--config`, else `./loan-approval.toml`, else
//!    `<config dir>/loan-approval/config.toml`
//! 4. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DB: &str = "LOAN_APPROVAL_DB";
pub const ENV_MODEL: &str = "LOAN_APPROVAL_MODEL";
pub const ENV_ADDR: &str = "LOAN_APPROVAL_ADDR";
pub const ENV_LOG: &str = "LOAN_APPROVAL_LOG";

const LOCAL_CONFIG: &str = "loan-approval.toml";
const LOG_FILE_NAME: &str = "loan-approval.log";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file holding users and the audit trail
    pub db_path: PathBuf,

    /// JSON model artifact
    pub model_path: PathBuf,

    /// Log file used while the TUI owns the terminal
    pub log_file: PathBuf,

    /// HTTP listen address for the server binary
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("loan-approval.db"),
            model_path: PathBuf::from("models/loan_forest.json"),
            log_file: Self::default_log_file(),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from file (if any) and environment.
    ///
    /// An explicit `path` must exist and parse; the implicit locations are
    /// skipped when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover() {
                Some(found) => Self::from_file(&found)?,
                None => AppConfig::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// First existing config file among the implicit locations
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|p| p.exists())
    }

    /// `<data dir>/loan-approval/loan-approval.log`, or the working
    /// directory when the platform has no data dir.
    pub fn default_log_file() -> PathBuf {
        match dirs::data_dir() {
            Some(dir) => dir.join("loan-approval").join(LOG_FILE_NAME),
            None => PathBuf::from(LOG_FILE_NAME),
        }
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("loan-approval").join("config.toml"))
    }

    /// Environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup(ENV_DB) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model_path = PathBuf::from(model);
        }
        if let Some(addr) = lookup(ENV_ADDR) {
            self.bind_addr = addr;
        }
        if let Some(log) = lookup(ENV_LOG) {
            self.log_file = PathBuf::from(log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("loan-approval.db"));
        assert_eq!(config.model_path, PathBuf::from("models/loan_forest.json"));
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_default_log_file_lives_in_data_dir() {
        let log_file = AppConfig::default().log_file;

        assert_eq!(log_file.file_name().unwrap(), LOG_FILE_NAME);
        if let Some(data_dir) = dirs::data_dir() {
            assert_eq!(log_file, data_dir.join("loan-approval").join(LOG_FILE_NAME));
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml("db_path = \"/var/lib/loans/users.db\"\n").unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/loans/users.db"));
        assert_eq!(config.model_path, AppConfig::default().model_path);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(AppConfig::from_toml("db_path = [").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_toml("bind_addr = \"0.0.0.0:8080\"\n").unwrap();
        let env: HashMap<&str, &str> =
            [(ENV_ADDR, "127.0.0.1:9000"), (ENV_MODEL, "/models/rf.json")].into();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.model_path, PathBuf::from("/models/rf.json"));
        assert_eq!(config.db_path, AppConfig::default().db_path);
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "log_file = \"/tmp/loans.log\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.log_file, PathBuf::from("/tmp/loans.log"));

        assert!(AppConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
