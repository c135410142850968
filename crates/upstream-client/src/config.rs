//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use upstream_core::{DEFAULT_READ_SIZE, DEFAULT_SHARD_SIZE};

/// Default web-core server
pub const DEFAULT_SERVER: &str = "http://node1.metadisk.org";

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "~/.upstream/config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the web-core server
    #[serde(default = "default_server")]
    pub server: String,

    /// Transfer configuration
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Size of each uploaded shard in bytes
    pub shard_size: u64,
    /// Slice width when streaming a shard from disk
    pub read_size: usize,
    /// Write granularity when saving a download
    pub download_chunk_size: usize,
    /// Timeout of the connectivity probe in seconds
    pub connect_timeout_secs: u64,
    /// Request body encoding used for uploads
    pub encoding: UploadEncoding,
}

/// How a shard is sent to `/api/upload`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadEncoding {
    /// Multipart form with the shard in the `file` field
    #[default]
    Multipart,
    /// Chunked transfer encoding; web-core does not accept it
    Chunked,
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
            read_size: DEFAULT_READ_SIZE,
            download_chunk_size: 1024,
            connect_timeout_secs: 2,
            encoding: UploadEncoding::Multipart,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            transfer: TransferConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a file, or use defaults if it does not exist
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the config named on the command line.
    ///
    /// Only the default location may be absent; any other path must exist.
    pub fn resolve(path: &str) -> anyhow::Result<Self> {
        let expanded = expand_path(path);
        if path == DEFAULT_CONFIG_PATH {
            Self::load_or_default(&expanded)
        } else {
            Self::load(&expanded).map_err(|e| {
                anyhow::anyhow!("Failed to load config {}: {}", expanded.display(), e)
            })
        }
    }

    /// Default configuration directory: `~/.upstream`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".upstream"))
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
