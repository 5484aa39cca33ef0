use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from svault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub upload: UploadConfig,
    pub download: DownloadConfig,
    pub refresh: RefreshConfig,
    pub store: StoreConfig,
    pub crypto: CryptoConfig,
    pub log: LogConfig,
    /// Blob sink POST endpoint URLs, in round-robin order.
    pub sinks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Plaintext bytes per chunk. Effectively immutable for a deployment:
    /// stored files survive a change (readers never assume uniform size),
    /// in-flight uploads during a change do not.
    pub chunk_size: usize,
    /// Concurrently in-flight chunk uploads, independent of sink count.
    pub window: usize,
    /// Send attempts per chunk before the upload is abandoned.
    pub max_send_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Chunks fetched/decrypted in parallel per window. Also bounds the
    /// reordering buffer: emission is in index order at window boundaries.
    pub window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Provider link-refresh API endpoint.
    pub endpoint: String,
    /// Links expiring within this many seconds are treated as expired.
    pub expiry_buffer_secs: u64,
    /// Maximum links per refresh request.
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Metadata store JSON file path.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// File holding the 64-hex-char master key. When unset, the key is
    /// read from the SVAULT_MASTER_KEY environment variable.
    pub master_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter (default: info)
    pub level: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5 * 1024 * 1024,
            window: 3,
            max_send_attempts: 3,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            expiry_buffer_secs: 300,
            batch_size: 10,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/svault/store.json"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
