//! Runtime configuration
//!
//! Loaded from a JSON file, then overridden from the environment:
//!
//! - `EVIDENCE_MAX_ARTIFACT_BYTES` - upload size limit in bytes
//! - `EVIDENCE_STORE_ROOT` - directory for the filesystem blob backend
//! - `EVIDENCE_DATABASE_PATH` - SQLite evidence repository file

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CustodyError, CustodyResult};

/// Default upload limit (100 MiB)
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 100 * 1024 * 1024;

const APP_DIR: &str = "evidence-custody";

pub const ENV_MAX_ARTIFACT_BYTES: &str = "EVIDENCE_MAX_ARTIFACT_BYTES";
pub const ENV_STORE_ROOT: &str = "EVIDENCE_STORE_ROOT";
pub const ENV_DATABASE_PATH: &str = "EVIDENCE_DATABASE_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Artifacts larger than this are rejected before analysis
    pub max_artifact_bytes: u64,
    pub store_root: PathBuf,
    pub database_path: PathBuf,
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Default for CustodyConfig {
    fn default() -> Self {
        let root = data_root();
        Self {
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            store_root: root.join("blobs"),
            database_path: root.join("evidence.db"),
        }
    }
}

impl CustodyConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> CustodyResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| CustodyError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: CustodyConfig = serde_json::from_str(&json)?;
        debug!(path = %path.display(), "Configuration file loaded");
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> CustodyResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file if given, then apply environment overrides
    pub fn resolve(path: Option<&Path>) -> CustodyResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        info!(
            max_artifact_bytes = config.max_artifact_bytes,
            store_root = %config.store_root.display(),
            database = %config.database_path.display(),
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CustodyResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_ARTIFACT_BYTES) {
            self.max_artifact_bytes = value.trim().parse().map_err(|e| {
                CustodyError::Config(format!("{}='{}': {}", ENV_MAX_ARTIFACT_BYTES, value, e))
            })?;
        }
        if let Some(value) = lookup(ENV_STORE_ROOT).filter(|v| !v.is_empty()) {
            self.store_root = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_DATABASE_PATH).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> CustodyResult<()> {
        if self.max_artifact_bytes == 0 {
            return Err(CustodyError::Config("max_artifact_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Override the upload limit
    pub fn with_max_artifact_bytes(mut self, limit: u64) -> Self {
        self.max_artifact_bytes = limit;
        self
    }
}
