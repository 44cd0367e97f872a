//! Master bootstrap: the root-level record holding the master salt.
//!
//! The record is the only container keyed directly by the user secret. Every
//! other container is keyed by the working key derived from it at mount.

use crate::config::{FsConfig, MASTER_FILENAME, MASTER_SALT_LENGTH, WORKING_KEY_LENGTH};
use crate::crypto::{self, b64, derive_key, random_bytes};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Parameters fixed when the filesystem is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Master salt for the working key.
    #[serde(with = "b64")]
    pub salt: Vec<u8>,
    /// Iterations for the master container and the working key.
    pub outer_iterations: u32,
    /// Salt size for every container.
    pub salt_size: usize,
    /// Iterations for every container below the root.
    pub inner_iterations: u32,
}

impl MasterRecord {
    /// Build a record with a fresh random master salt.
    pub fn generate(config: &FsConfig) -> Self {
        Self {
            salt: random_bytes(MASTER_SALT_LENGTH),
            outer_iterations: config.outer_iterations,
            salt_size: config.salt_size,
            inner_iterations: config.inner_iterations,
        }
    }

    /// The tunables this record was created with.
    pub fn config(&self) -> FsConfig {
        FsConfig::new(self.outer_iterations, self.salt_size, self.inner_iterations)
    }
}

/// Get the master record path for a root.
pub fn file_path(root: &Path) -> PathBuf {
    root.join(MASTER_FILENAME)
}

/// Check whether a filesystem has been created at `root`.
pub fn exists(root: &Path) -> bool {
    file_path(root).exists()
}

/// Create the master record at `root`.
///
/// Fails with `AlreadyExists` if a record is present or `root` holds
/// anything at all. A missing `root` is created.
pub fn create(secret: &[u8], root: &Path, config: &FsConfig) -> Result<MasterRecord> {
    config.validate()?;

    if exists(root) {
        return Err(Error::AlreadyExists(format!(
            "master record in {}",
            root.display()
        )));
    }

    if root.exists() {
        if fs::read_dir(root)?.next().is_some() {
            return Err(Error::AlreadyExists(format!(
                "{} is not empty",
                root.display()
            )));
        }
    } else {
        fs::create_dir_all(root)?;
    }

    let record = MasterRecord::generate(config);
    let payload = serde_json::to_vec(&record)?;
    let container = crypto::encrypt(secret, &payload, &config.master_params())?;
    fs::write(file_path(root), container)?;

    info!(root = %root.display(), "Created master record");
    Ok(record)
}

/// Read and decrypt the master record.
pub fn load(secret: &[u8], root: &Path, outer_iterations: u32) -> Result<MasterRecord> {
    let path = file_path(root);
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "no filesystem at {}",
            root.display()
        )));
    }

    let container = fs::read(&path)?;
    let payload = crypto::decrypt(secret, &container, outer_iterations)?;
    let record: MasterRecord = serde_json::from_slice(&payload)?;

    debug!(root = %root.display(), "Read master record");
    Ok(record)
}

/// Derive the working key from the secret and the record's master salt.
pub fn working_key(
    secret: &[u8],
    record: &MasterRecord,
    outer_iterations: u32,
) -> Result<Zeroizing<Vec<u8>>> {
    derive_key(secret, &record.salt, outer_iterations, WORKING_KEY_LENGTH)
}

/// Load the record and derive the working key: the full mount bootstrap.
pub fn mount(
    secret: &[u8],
    root: &Path,
    outer_iterations: u32,
) -> Result<(MasterRecord, Zeroizing<Vec<u8>>)> {
    let record = load(secret, root, outer_iterations)?;
    let key = working_key(secret, &record, outer_iterations)?;
    info!(root = %root.display(), "Mounted filesystem");
    Ok((record, key))
}
