//! Configuration loaded from TOML with environment overrides.
//!
//! Resolution order: built-in defaults, then the TOML file (explicit path,
//! else `ANN_DKVS_CONFIG`), then `ANN_DKVS_*` environment variables. A `.env`
//! file (or the one named by `ANN_DKVS_ENV_FILE`) is loaded into the
//! environment first; variables already set win over it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AnnError, Result};
use crate::types::ParallelMode;

const ENV_PREFIX: &str = "ANN_DKVS_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backing file of the list store region.
    pub path: PathBuf,
    /// Number of f32 elements per stored vector.
    pub vector_dim: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lists.bin"),
            vector_dim: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lists probed per query.
    pub n_probe: usize,
    /// Neighbors returned per query.
    pub n_results: usize,
    pub parallel_mode: ParallelMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_probe: 8,
            n_results: 10,
            parallel_mode: ParallelMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, `ANN_DKVS_CONFIG`, or defaults, then
    /// apply environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        load_dotenv()?;
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var(format!("{ENV_PREFIX}CONFIG")).ok());

        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AnnError::Config(format!("failed to read {path}: {e}")))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AnnError::Config(format!("invalid toml: {e}")))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_var("STORAGE_PATH") {
            self.storage.path = PathBuf::from(v);
        }
        if let Some(v) = env_var("VECTOR_DIM") {
            self.storage.vector_dim = parse_env("VECTOR_DIM", &v)?;
        }
        if let Some(v) = env_var("N_PROBE") {
            self.search.n_probe = parse_env("N_PROBE", &v)?;
        }
        if let Some(v) = env_var("N_RESULTS") {
            self.search.n_results = parse_env("N_RESULTS", &v)?;
        }
        if let Some(v) = env_var("PARALLEL_MODE") {
            self.search.parallel_mode = v.parse().map_err(AnnError::Config)?;
        }
        if let Some(v) = env_var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_var("LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Reject values no store or query could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.storage.vector_dim == 0 {
            return Err(AnnError::Config("storage.vector_dim must be > 0".into()));
        }
        if self.search.n_probe == 0 {
            return Err(AnnError::Config("search.n_probe must be > 0".into()));
        }
        if self.search.n_results == 0 {
            return Err(AnnError::Config("search.n_results must be > 0".into()));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(AnnError::Config(format!(
                "logging.format must be text or json, got {other}"
            ))),
        }
    }
}

fn load_dotenv() -> Result<()> {
    match env_var("ENV_FILE") {
        Some(path) => {
            dotenvy::from_path(&path)
                .map_err(|e| AnnError::Config(format!("failed to load {path}: {e}")))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| AnnError::Config(format!("{ENV_PREFIX}{name}: cannot parse {value:?}")))
}
