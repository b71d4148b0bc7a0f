//! User settings
//!
//! Read from `$FOLIO_CONFIG`, or `<config dir>/folio/config.toml` when that
//! variable is unset. A missing file means defaults. `FOLIO_DB` and
//! `FOLIO_USER` override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV: &str = "FOLIO_CONFIG";
pub const DB_ENV: &str = "FOLIO_DB";
pub const USER_ENV: &str = "FOLIO_USER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// SQLite file; `~/.folio/data.db` when unset
    pub database_path: Option<PathBuf>,
    pub default_user: String,
    /// Tracing filter used when RUST_LOG is unset
    pub log_filter: String,
    pub base_currency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            default_user: "default".to_string(),
            log_filter: "warn".to_string(),
            base_currency: "USD".to_string(),
        }
    }
}

impl Settings {
    /// Location of the config file
    pub fn config_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => dir_spec::config_home().map(|dir| dir.join("folio").join("config.toml")),
        }
    }

    /// Load settings from the config file and environment.
    pub fn load() -> Result<Self> {
        let settings = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(settings.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let settings = Self::parse(&contents)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `FOLIO_DB` / `FOLIO_USER` style overrides from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(db) = lookup(DB_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(user) = lookup(USER_ENV).filter(|v| !v.trim().is_empty()) {
            self.default_user = user.trim().to_string();
        }
        self
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::db::get_default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_user, "default");
        assert_eq!(settings.log_filter, "warn");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Settings::parse(
            r#"
            database_path = "/tmp/ledger.db"
            default_user = "alice"
            "#,
        )
        .unwrap();
        assert_eq!(settings.database_path, Some(PathBuf::from("/tmp/ledger.db")));
        assert_eq!(settings.default_user, "alice");
        assert_eq!(settings.base_currency, "USD");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Settings::parse("databse_path = \"x\"").is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let settings = Settings::parse("default_user = \"alice\"")
            .unwrap()
            .with_overrides(|key| match key {
                DB_ENV => Some("/data/folio.db".to_string()),
                USER_ENV => Some(" bob ".to_string()),
                _ => None,
            });
        assert_eq!(settings.database_path().unwrap(), PathBuf::from("/data/folio.db"));
        assert_eq!(settings.default_user, "bob");
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let settings = Settings::default().with_overrides(|_| Some("  ".to_string()));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_filter = \"folio=debug\"\n").unwrap();
        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.log_filter, "folio=debug");
    }
}
