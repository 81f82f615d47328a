//! Process configuration: defaults, then the TOML config file, then
//! `CONFHIVE__SECTION__KEY` environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "confhive";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub transactions: TransactionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the level-file tree. `~` and env vars are expanded.
    pub root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "~/.local/share/confhive/store".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionsConfig {
    /// Pending transactions idle this long are aborted.
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 900,
            sweep_interval_secs: 60,
        }
    }
}

impl TransactionsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Sweep period, never below one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration layered over the built-in defaults. A missing
    /// file is not an error.
    pub fn load(config_file: &Path) -> Result<Self> {
        let defaults = Self::default();
        let built = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("store.root", defaults.store.root)?
            .set_default(
                "transactions.idle_timeout_secs",
                defaults.transactions.idle_timeout_secs as i64,
            )?
            .set_default(
                "transactions.sweep_interval_secs",
                defaults.transactions.sweep_interval_secs as i64,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(&env_prefix()).separator("__"))
            .build()
            .with_context(|| format!("loading config from {}", config_file.display()))?;

        built
            .try_deserialize()
            .context("deserializing configuration")
    }

    /// Store root with `~` and environment variables expanded.
    pub fn store_root(&self) -> Result<PathBuf> {
        expand_str_path(&self.store.root)
    }
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let toml = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    let body = format!(
        "# Configuration for {}\n# File: {}\n\n{}",
        APP_NAME,
        path.display(),
        toml
    );
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

/// Config file location: an explicit override (a directory means
/// `<dir>/config.toml`) or the platform config dir.
pub fn resolve_config_file(override_path: Option<PathBuf>) -> Result<PathBuf> {
    match override_path {
        Some(path) => {
            let expanded = expand_path(path)?;
            if expanded.is_dir() {
                Ok(expanded.join("config.toml"))
            } else {
                Ok(expanded)
            }
        }
        None => Ok(default_config_dir()?.join("config.toml")),
    }
}

pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    match path.to_str() {
        Some(text) => expand_str_path(text),
        None => Ok(path),
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn env_prefix() -> String {
    APP_NAME.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.transactions.idle_timeout_secs, 900);
        assert_eq!(config.transactions.sweep_interval_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[server]\nport = 9191\n\n[transactions]\nidle_timeout_secs = 30\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.transactions.idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        write_default_config(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Configuration for confhive"));
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_resolve_config_file_for_directory() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_config_file(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(resolved, dir.path().join("config.toml"));
    }

    #[test]
    fn test_sweep_interval_has_floor() {
        let config = TransactionsConfig {
            idle_timeout_secs: 0,
            sweep_interval_secs: 0,
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
