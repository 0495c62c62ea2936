use std::path::{Path, PathBuf};

use chrono::Weekday;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    aggregate::DEFAULT_WEEK_START,
    error::{Error, Result},
};

pub const CONFIG_FILE: &str = "config.toml";

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("fyi", "intake", "alcohol-intake-tracker")
        .ok_or_else(|| Error::Config("unable to locate a home directory".into()))
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Local,
    Remote,
}

/// Connection to the hosted backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            access_token: None,
            user_id: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub store: StoreKind,
    /// Overrides the platform data directory (history and logs)
    pub data_dir: Option<PathBuf>,
    pub backend: BackendConfig,
    pub classifier_disabled: bool,
    pub week_start: Weekday,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::Local,
            data_dir: None,
            backend: BackendConfig::default(),
            classifier_disabled: false,
            week_start: DEFAULT_WEEK_START,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads `path`, or the platform config file when `None`. A missing file
    /// means defaults. Environment variables win over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => project_dirs()?.config_dir().join(CONFIG_FILE),
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.try_exists()? {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var("INTAKE_BACKEND_URL") {
            self.backend.url = Some(url);
        }
        if let Some(key) = var("INTAKE_ANON_KEY") {
            self.backend.anon_key = Some(key);
        }
        if let Some(token) = var("INTAKE_ACCESS_TOKEN") {
            self.backend.access_token = Some(token);
        }
        if let Some(user_id) = var("INTAKE_USER_ID") {
            self.backend.user_id = Some(user_id);
        }
        if let Some(disabled) = var("INTAKE_CLASSIFIER_DISABLED") {
            self.classifier_disabled = disabled.trim().eq_ignore_ascii_case("true");
        }
        if let Some(store) = var("INTAKE_STORE") {
            self.store = match store.trim().to_ascii_lowercase().as_str() {
                "local" => StoreKind::Local,
                "remote" => StoreKind::Remote,
                other => return Err(Error::Config(format!("unknown store `{other}`"))),
            };
        }
        if let Some(level) = var("INTAKE_LOG") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }
}
