//! herbtrace configuration loading
//!
//! Loads configuration from `~/.config/herbtrace/config.toml` (or the
//! `HERBTRACE_CONFIG` env var). Every key is optional.
//!
//! ```toml
//! db_path = "~/.local/share/herbtrace/records.db"
//! backend = "sqlite"
//!
//! [store]
//! pool_size = 8
//! busy_timeout_ms = 5000
//! durability = "full"
//!
//! [token]
//! namespace = "herbtrace"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{ChainError, Result};
use crate::store::{Durability, SqliteOptions};
use crate::token::TokenCodec;

/// Root configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HerbtraceConfig {
    /// Path to the SQLite record database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Which record store backs the engine
    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub token: TokenConfig,
}

fn default_db_path() -> String {
    dirs::home_dir()
        .map(|h| {
            h.join(".local")
                .join("share")
                .join("herbtrace")
                .join("records.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "herbtrace.db".to_string())
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Sqlite,
    /// Process-local; nothing survives exit
    Memory,
}

/// SQLite store settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Maximum pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// How long a writer waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default)]
    pub durability: Durability,
}

fn default_pool_size() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            durability: Durability::default(),
        }
    }
}

impl StoreConfig {
    pub fn sqlite_options(&self) -> SqliteOptions {
        SqliteOptions {
            pool_size: self.pool_size,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            durability: self.durability,
        }
    }
}

/// Token encoding settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TokenConfig {
    /// Prefix on minted tokens; empty string disables it
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    TokenCodec::DEFAULT_NAMESPACE.to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

impl TokenConfig {
    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(Some(self.namespace.clone()))
    }
}

impl Default for HerbtraceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backend: Backend::default(),
            store: StoreConfig::default(),
            token: TokenConfig::default(),
        }
    }
}

impl HerbtraceConfig {
    /// Environment variable overriding the config file path
    pub const ENV_CONFIG_PATH: &'static str = "HERBTRACE_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Load configuration.
    ///
    /// Resolution order:
    /// 1. `explicit` (the `--config` flag)
    /// 2. `HERBTRACE_CONFIG` environment variable
    /// 3. `~/.config/herbtrace/config.toml`
    ///
    /// A missing file at the default location yields the defaults. A missing
    /// file that was named explicitly is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH)
            && !path.trim().is_empty()
        {
            return Self::load_from_path(Path::new(&path));
        }

        let path = Self::default_config_path();
        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "herbtrace config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ChainError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: HerbtraceConfig = toml::from_str(contents)
            .map_err(|e| ChainError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("herbtrace")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.pool_size == 0 {
            return Err(ChainError::config("store.pool_size must be at least 1"));
        }

        if self.token.namespace.contains(':') {
            return Err(ChainError::config(format!(
                "token.namespace `{}` must not contain ':'",
                self.token.namespace
            )));
        }

        if self.backend == Backend::Sqlite && self.db_path.trim().is_empty() {
            return Err(ChainError::config("db_path must not be empty"));
        }

        if self.store.busy_timeout_ms == 0 {
            tracing::warn!("store.busy_timeout_ms is 0; concurrent writers will fail fast");
        }

        Ok(())
    }

    /// Get the resolved database path (expands ~)
    pub fn resolved_db_path(&self) -> PathBuf {
        let path = &self.db_path;
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(stripped);
        }
        PathBuf::from(path)
    }
}
