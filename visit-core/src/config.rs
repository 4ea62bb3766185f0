use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::BackendType;
use crate::derived::DEFAULT_FOLLOW_UP_WINDOW;
use crate::export::DEFAULT_DATE_FORMAT;

pub const CONFIG_PATH_ENV: &str = "VISITS_CONFIG";
pub const DB_PATH_ENV: &str = "VISITS_DB_PATH";
pub const USER_ENV: &str = "VISITS_USER";

/// User settings, stored as YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data file; the backend is inferred from its extension unless
    /// `backend` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendType>,
    /// Owner id used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_user: Option<String>,
    /// chrono format string for dates in reports
    pub date_format: String,
    /// Days ahead a follow-up counts as pending
    pub follow_up_window: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            backend: None,
            default_user: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            follow_up_window: DEFAULT_FOLLOW_UP_WINDOW,
        }
    }
}

impl AppConfig {
    /// Loads the config from `path`; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        if config.follow_up_window < 0 {
            anyhow::bail!(
                "follow_up_window must not be negative (got {}) in {:?}",
                config.follow_up_window,
                path
            );
        }
        Ok(config)
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Writes a default config file if none exists
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        if path.as_ref().exists() {
            return Ok(());
        }
        Self::default().save(path)
    }

    /// Data file to open: flag, then `VISITS_DB_PATH`, then the config,
    /// then the per-user data directory
    pub fn resolve_data_path(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        let env = std::env::var(DB_PATH_ENV).ok().map(PathBuf::from);
        match first_of(flag, env, self.data_path.clone()) {
            Some(path) => Ok(path),
            None => default_data_path(),
        }
    }

    /// Current user: flag, then `VISITS_USER`, then the config
    pub fn resolve_user(&self, flag: Option<String>) -> Option<String> {
        let env = std::env::var(USER_ENV).ok();
        first_of(flag, env, self.default_user.clone()).filter(|u| !u.trim().is_empty())
    }
}

fn first_of<T>(flag: Option<T>, env: Option<T>, configured: Option<T>) -> Option<T> {
    flag.or(env).or(configured)
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(config_dir.join("visits").join("config.yaml"))
}

/// Default location of the data file
pub fn default_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("Failed to determine data directory")?;
    Ok(data_dir.join("visits").join("visits.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("none.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.follow_up_window, 2);
        assert_eq!(config.date_format, "%m/%d/%Y");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "backend: sqlite\ndefault_user: alice\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.backend, Some(BackendType::Sqlite));
        assert_eq!(config.default_user.as_deref(), Some("alice"));
        assert_eq!(config.follow_up_window, DEFAULT_FOLLOW_UP_WINDOW);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = AppConfig {
            data_path: Some(PathBuf::from("/srv/visits.db")),
            follow_up_window: 5,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);

        AppConfig::create_default(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().follow_up_window, 5);
    }

    #[test]
    fn test_negative_window_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "follow_up_window: -1\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_precedence() {
        assert_eq!(first_of(Some(1), Some(2), Some(3)), Some(1));
        assert_eq!(first_of(None, Some(2), Some(3)), Some(2));
        assert_eq!(first_of(None, None, Some(3)), Some(3));
        assert_eq!(first_of::<i32>(None, None, None), None);
    }
}
