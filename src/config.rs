//! Configuration constants and types for fernetfs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default PBKDF2 iteration count for the mount-time (outer) derivation.
pub const DEFAULT_OUTER_ITERATIONS: u32 = 480_000;

/// Default PBKDF2 iteration count for every container below the root.
pub const DEFAULT_INNER_ITERATIONS: u32 = 48_000;

/// Default per-container salt size in bytes.
pub const DEFAULT_SALT_SIZE: usize = 16;

/// Length of the working key derived at mount.
pub const WORKING_KEY_LENGTH: usize = 256;

/// Length of the random master salt stored in the master record.
pub const MASTER_SALT_LENGTH: usize = 128;

/// Length of a container encryption key (AES-256).
pub const CONTAINER_KEY_LENGTH: usize = 32;

/// Random bytes hashed into each opaque identifier.
pub const OPAQUE_ID_RANDOM_BYTES: usize = 32;

/// Length of a hex-encoded opaque identifier.
pub const OPAQUE_ID_LENGTH: usize = 64;

/// Master record file name, at the filesystem root only.
pub const MASTER_FILENAME: &str = ".fernet";

/// Subdirectory listing file name.
pub const DIRECTORIES_FILENAME: &str = ".directories";

/// File listing file name.
pub const FILES_FILENAME: &str = ".files";

/// Suffix of plaintext copies materialized by RAM edit sessions.
pub const RAM_FILE_SUFFIX: &str = ".plain";

/// Prefix of plaintext copies materialized by RAM edit sessions.
pub const RAM_FILE_PREFIX: &str = "fernetfs-";

/// RAM-backed location used for plaintext copies.
pub const DEFAULT_RAM_DIR: &str = "/dev/shm";

/// Tunables chosen when a filesystem is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    /// Iterations for the master container and the working key.
    pub outer_iterations: u32,

    /// Salt size in bytes for every container.
    pub salt_size: usize,

    /// Iterations for every container keyed by the working key.
    pub inner_iterations: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            outer_iterations: DEFAULT_OUTER_ITERATIONS,
            salt_size: DEFAULT_SALT_SIZE,
            inner_iterations: DEFAULT_INNER_ITERATIONS,
        }
    }
}

impl FsConfig {
    /// Create a new configuration with custom settings.
    pub fn new(outer_iterations: u32, salt_size: usize, inner_iterations: u32) -> Self {
        Self {
            outer_iterations,
            salt_size,
            inner_iterations,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.outer_iterations == 0 {
            return Err(Error::InvalidConfig(
                "Outer iterations must be greater than 0".to_string(),
            ));
        }
        if self.inner_iterations == 0 {
            return Err(Error::InvalidConfig(
                "Inner iterations must be greater than 0".to_string(),
            ));
        }
        if self.salt_size == 0 {
            return Err(Error::InvalidConfig(
                "Salt size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parameters of the master container, keyed by the raw user secret.
    pub fn master_params(&self) -> CipherParams {
        CipherParams::new(self.outer_iterations, self.salt_size)
    }

    /// Parameters of every container keyed by the working key.
    pub fn container_params(&self) -> CipherParams {
        CipherParams::new(self.inner_iterations, self.salt_size)
    }
}

/// Per-container key derivation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    /// PBKDF2 iterations.
    pub iterations: u32,

    /// Size of the fresh random salt generated on encryption.
    pub salt_size: usize,
}

impl CipherParams {
    pub fn new(iterations: u32, salt_size: usize) -> Self {
        Self {
            iterations,
            salt_size,
        }
    }
}

impl Default for CipherParams {
    fn default() -> Self {
        FsConfig::default().container_params()
    }
}

/// Pick the directory used for plaintext copies.
///
/// Prefers [`DEFAULT_RAM_DIR`]; falls back to the OS temp directory when it
/// is not available, which is no longer RAM-backed on most systems.
pub fn default_ram_dir() -> PathBuf {
    let ram = Path::new(DEFAULT_RAM_DIR);
    if ram.is_dir() {
        ram.to_path_buf()
    } else {
        let fallback = std::env::temp_dir();
        tracing::warn!(
            fallback = %fallback.display(),
            "{} is not available, plaintext copies will not be RAM-backed",
            DEFAULT_RAM_DIR
        );
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(FsConfig::new(0, 16, 100).validate().is_err());
        assert!(FsConfig::new(100, 0, 100).validate().is_err());
        assert!(matches!(
            FsConfig::new(100, 16, 0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_params_split() {
        let config = FsConfig::new(1000, 24, 10);
        assert_eq!(config.master_params(), CipherParams::new(1000, 24));
        assert_eq!(config.container_params(), CipherParams::new(10, 24));
    }
}
