//! Pipeline configuration.
//!
//! Everything the original kept as module-level constants, as one
//! serializable value loaded from TOML and passed into each component.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{FetchRequest, Interval};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Full parameter set of the partition-and-sync pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    // Market data
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    pub bar_count: usize,
    #[serde(default)]
    pub extended_session: bool,

    // Local layout
    pub output_dir: PathBuf,

    // Object storage
    pub bucket: String,
    pub key_prefix: String,
    pub region: String,

    // Catalog
    pub database_name: String,
    pub crawler_name: String,
    pub role_arn: String,
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

fn default_poll_interval_s() -> u64 {
    10
}

fn default_timeout_s() -> u64 {
    1800
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The fetch this configuration describes.
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            interval: self.interval,
            bar_count: self.bar_count,
            extended_session: self.extended_session,
        }
    }

    /// Crawler target URI: `s3://<bucket>/<prefix>/`.
    pub fn s3_target_path(&self) -> String {
        format!("s3://{}/{}/", self.bucket, self.key_prefix.trim_matches('/'))
    }
}
