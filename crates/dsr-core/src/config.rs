use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::retry::BackoffLaw;

/// Which document store backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

/// `[store]` section: backend selection and connection pool bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite file; `None` = `~/.local/state/dsr/store.db`.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a pooled connection before `PoolTimedOut`.
    pub acquire_timeout_ms: u64,
    /// Idle connections are closed after this many seconds (None = never).
    pub idle_timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: None,
            max_connections: 4,
            min_connections: 0,
            acquire_timeout_ms: 5_000,
            idle_timeout_secs: Some(300),
        }
    }
}

/// Retry parameters for one operation class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(default)]
    pub jitter: bool,
    #[serde(default)]
    pub backoff: BackoffLaw,
}

impl RetryConfig {
    /// One retry after a fixed one-second pause.
    pub fn read_default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 1_000,
            jitter: false,
            backoff: BackoffLaw::Exponential,
        }
    }

    /// Four retries, exponential from 1s capped at 7s, jittered.
    pub fn write_default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 7_000,
            jitter: true,
            backoff: BackoffLaw::Exponential,
        }
    }
}

/// `[retry.read]`, `[retry.write]`, `[retry.transaction]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfigs {
    pub read: RetryConfig,
    pub write: RetryConfig,
    pub transaction: RetryConfig,
}

impl Default for RetryConfigs {
    fn default() -> Self {
        Self {
            read: RetryConfig::read_default(),
            write: RetryConfig::write_default(),
            transaction: RetryConfig::write_default(),
        }
    }
}

/// `[classifier]`: signatures appended to the built-in transient set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub extra_kinds: Vec<String>,
    pub extra_messages: Vec<String>,
}

/// Global configuration loaded from `~/.config/dsr/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DsrConfig {
    pub store: StoreConfig,
    pub retry: RetryConfigs,
    pub classifier: ClassifierConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dsr")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DsrConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DsrConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file. Missing sections take defaults.
pub fn load_from(path: &Path) -> Result<DsrConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: DsrConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = DsrConfig::default();
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.store.max_connections, 4);
        assert_eq!(cfg.retry.read.max_attempts, 2);
        assert!(!cfg.retry.read.jitter);
        assert_eq!(cfg.retry.write.max_attempts, 5);
        assert_eq!(cfg.retry.write.max_delay_ms, 7_000);
        assert_eq!(cfg.retry.transaction, cfg.retry.write);
        assert!(cfg.classifier.extra_kinds.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = DsrConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DsrConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.retry, cfg.retry);
        assert_eq!(parsed.classifier, cfg.classifier);
        assert_eq!(parsed.store.acquire_timeout_ms, cfg.store.acquire_timeout_ms);
    }

    #[test]
    fn empty_file_takes_defaults() {
        let cfg: DsrConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.retry, RetryConfigs::default());
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            [store]
            backend = "memory"
            max_connections = 1
            acquire_timeout_ms = 250

            [retry.write]
            max_attempts = 3
            base_delay_ms = 100
            max_delay_ms = 800
            backoff = "fibonacci"

            [classifier]
            extra_kinds = ["PoolTimedOut"]
        "#;
        let cfg: DsrConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.store.max_connections, 1);
        assert_eq!(cfg.store.acquire_timeout_ms, 250);
        assert_eq!(cfg.store.idle_timeout_secs, Some(300));
        assert_eq!(cfg.retry.write.max_attempts, 3);
        assert!(!cfg.retry.write.jitter);
        assert_eq!(cfg.retry.write.backoff, BackoffLaw::Fibonacci);
        assert_eq!(cfg.retry.read, RetryConfig::read_default());
        assert_eq!(cfg.classifier.extra_kinds, vec!["PoolTimedOut".to_string()]);
    }

    #[test]
    fn load_from_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }
}
