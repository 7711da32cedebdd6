//! Config loading and persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository name carried in rebuild dispatches.
    pub repository: String,
    /// Seconds between periodic out-of-band rebuild dispatches.
    pub rebuild_interval_secs: u64,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: String::new(),
            // The source pipeline retriggered every four hours.
            rebuild_interval_secs: 4 * 60 * 60,
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Local checkout of the data repository.
    pub data_repo_path: PathBuf,
    /// Ref carrying the four row collections.
    pub data_ref: String,
    /// Ref carrying the compiled artifact, written by the build pipeline.
    pub build_ref: String,
    pub push_on_commit: bool,
    pub commit_author: String,
    pub commit_email: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_repo_path: PathBuf::new(),
            data_ref: "refs/heads/main".to_string(),
            build_ref: "refs/heads/build".to_string(),
            push_on_commit: false,
            commit_author: "sill-data".to_string(),
            commit_email: "sill-data@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

pub fn load(path: &Path) -> crate::Result<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| config_error(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map_err(|e| config_error(format!("failed to parse {}: {e}", path.display())))
}

pub fn load_or_init(path: &Path) -> Config {
    if path.exists() {
        match load(path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                return Config::default();
            }
        }
    }

    let cfg = Config::default();
    if let Err(e) = write_config(path, &cfg) {
        tracing::warn!("failed to write default config: {e}");
    }
    cfg
}

pub fn write_config(path: &Path, cfg: &Config) -> crate::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| config_error(format!("failed to create {}: {e}", dir.display())))?;
    }
    let contents = toml::to_string_pretty(cfg)
        .map_err(|e| config_error(format!("failed to render config: {e}")))?;
    atomic_write(path, contents.as_bytes())
}

fn atomic_write(path: &Path, data: &[u8]) -> crate::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| config_error("config path missing parent directory".to_string()))?;
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        config_error(format!(
            "failed to create temp file in {}: {e}",
            dir.display()
        ))
    })?;
    fs::write(temp.path(), data)
        .map_err(|e| config_error(format!("failed to write config temp file: {e}")))?;
    temp.persist(path).map_err(|e| {
        config_error(format!(
            "failed to persist config to {}: {e}",
            path.display()
        ))
    })?;
    Ok(())
}

fn config_error(reason: String) -> crate::Error {
    crate::Error::Op(crate::engine::OpError::ValidationFailed {
        field: "config".into(),
        reason,
    })
}
