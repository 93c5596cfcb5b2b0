//! Configuration layer: defaults, overridden by an optional JSON file, overridden
//! in turn by environment variables. Mirrors the override precedence the teacher's
//! own `AppConfig::load` used for its server URL.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{WipeError, WipeResult};
use crate::validation::validate_safe_path;

pub const APP_VERSION: &str = "2.0.0-Enterprise";

/// Canonical overwrite/hash block size. 4 MiB, matching the reference
/// implementation's `WIPE_BLOCK_SIZE_BYTES` constant.
pub const WIPE_BLOCK_SIZE_BYTES: usize = 4 * 1024 * 1024;

/// How often the device scanner re-lists removable drives while idle.
pub const DEFAULT_SCANNER_POLL_SECS: u64 = 2;

pub const RSA_KEY_BITS: usize = 4096;
pub const QR_BOX_SIZE: u32 = 12;
pub const QR_BORDER: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub key_dir: PathBuf,
    pub certificate_dir: PathBuf,
    pub log_dir: PathBuf,
    pub block_size: usize,
    pub scanner_poll_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("keys"),
            certificate_dir: PathBuf::from("certificates"),
            log_dir: PathBuf::from("logs"),
            block_size: WIPE_BLOCK_SIZE_BYTES,
            scanner_poll_secs: DEFAULT_SCANNER_POLL_SECS,
        }
    }
}

impl AppConfig {
    /// Resolve configuration: built-in defaults, then an optional JSON file,
    /// then environment variable overrides. A malformed config file is a fatal
    /// startup error, not a value silently discarded.
    pub fn load(config_path: Option<&str>) -> WipeResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            let content = fs::read_to_string(path)
                .map_err(|e| WipeError::configuration(format!("failed to read {path}: {e}")))?;
            config = serde_json::from_str(&content)
                .map_err(|e| WipeError::configuration(format!("malformed config {path}: {e}")))?;
        }

        if let Ok(dir) = env::var("ECOWIPE_KEY_DIR") {
            config.key_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("ECOWIPE_CERT_DIR") {
            config.certificate_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("ECOWIPE_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Create the key/certificate/log directories, rejecting any configured
    /// path whose stem is a reserved device name (§6) before ever touching
    /// the filesystem.
    pub fn ensure_directories(&self) -> WipeResult<()> {
        for dir in [&self.key_dir, &self.certificate_dir, &self.log_dir] {
            let dir_str = dir.to_str().ok_or_else(|| {
                WipeError::configuration(format!("{dir:?} is not valid UTF-8"))
            })?;
            validate_safe_path(dir_str)?;

            fs::create_dir_all(dir)
                .map_err(|e| WipeError::configuration(format!("cannot create {dir:?}: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.block_size, WIPE_BLOCK_SIZE_BYTES);
        assert_eq!(config.scanner_poll_secs, DEFAULT_SCANNER_POLL_SECS);
    }

    #[test]
    fn malformed_config_file_is_fatal() {
        let dir = env::temp_dir().join("ecowipe_test_config_malformed.json");
        fs::write(&dir, "{ not json").unwrap();
        let result = AppConfig::load(Some(dir.to_str().unwrap()));
        assert!(result.is_err());
        let _ = fs::remove_file(&dir);
    }
}
