//! Configuration loading and types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use hostmeta_collect::Category;
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "HOSTMETA_CONFIG";

/// Top-level configuration, read from `hostmeta.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Inventory store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backing JSON file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Directory merge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Where `merge` writes when no `--out` is given
    #[serde(default = "default_merge_output")]
    pub output: PathBuf,
    /// Nest merged hosts under this key
    #[serde(default)]
    pub root: Option<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            output: default_merge_output(),
            root: None,
        }
    }
}

/// Collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Per-probe timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Categories collected when `--only` is not given
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
    /// Git checkouts to report, name → path
    #[serde(default)]
    pub git_paths: BTreeMap<String, PathBuf>,
}

impl CollectConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured categories, or the collector defaults
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.categories
            .clone()
            .unwrap_or_else(|| Category::DEFAULT.to_vec())
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            categories: None,
            git_paths: BTreeMap::new(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/servers.json")
}

fn default_merge_output() -> PathBuf {
    PathBuf::from("data/merged.json")
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load `explicit` if given, otherwise search the default locations
    ///
    /// Also returns the file the configuration came from, `None` when the
    /// defaults are used.
    ///
    /// # Errors
    /// Returns error if the chosen file cannot be read or parsed
    pub fn resolve(explicit: Option<&Path>) -> eyre::Result<(Self, Option<PathBuf>)> {
        match explicit {
            Some(path) => Ok((Self::load(path)?, Some(path.to_path_buf()))),
            None => Self::load_default(),
        }
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("hostmeta.toml"),
            PathBuf::from("/etc/hostmeta/hostmeta.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hostmeta/hostmeta.toml"));
        }

        Self::load_first(&paths)
    }

    /// Load the first existing file among `paths`, or defaults
    fn load_first(paths: &[PathBuf]) -> eyre::Result<(Self, Option<PathBuf>)> {
        match paths.iter().find(|p| p.exists()) {
            Some(path) => Ok((Self::load(path)?, Some(path.clone()))),
            None => Ok((Config::default(), None)),
        }
    }
}
