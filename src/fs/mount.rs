//! The mount session: working key, cached master record, identifier source.
//!
//! One `Mount` is created per mounted root and shared by every directory,
//! listing, file handle and edit session through an `Arc`. It is read-only
//! after construction.

use crate::config::CipherParams;
use crate::crypto;
use crate::error::{Error, Result};
use crate::fs::ids::IdSource;
use crate::fs::master::MasterRecord;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;
use zeroize::Zeroizing;

pub struct Mount {
    root: PathBuf,
    key: Zeroizing<Vec<u8>>,
    record: MasterRecord,
    ids: Arc<dyn IdSource>,
}

impl Mount {
    pub fn new(
        root: PathBuf,
        key: Zeroizing<Vec<u8>>,
        record: MasterRecord,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            root,
            key,
            record,
            ids,
        }
    }

    /// On-disk root of the mounted tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The working key every container below the root is keyed by.
    pub fn working_key(&self) -> &[u8] {
        &self.key
    }

    /// The master record read at mount.
    pub fn record(&self) -> &MasterRecord {
        &self.record
    }

    /// Parameters for containers keyed by the working key.
    pub fn cipher_params(&self) -> CipherParams {
        CipherParams::new(self.record.inner_iterations, self.record.salt_size)
    }

    /// Allocate a fresh opaque identifier.
    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }

    /// Encrypt `plaintext` under the working key.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        crypto::encrypt(&self.key, plaintext, &self.cipher_params())
    }

    /// Decrypt a container keyed by the working key.
    pub fn unseal(&self, container: &[u8]) -> Result<Vec<u8>> {
        crypto::decrypt(&self.key, container, self.record.inner_iterations)
    }

    /// Read and decrypt the container at `path`.
    pub fn read_container(&self, path: &Path) -> Result<Vec<u8>> {
        let container = fs::read(path)?;
        trace!(path = %path.display(), bytes = container.len(), "Read container");
        self.unseal(&container)
    }

    /// Encrypt `plaintext` and replace the container at `path` with it.
    ///
    /// The new container is written to a temporary file next to `path` and
    /// renamed over it, so readers see either the old or the new content.
    pub fn write_container(&self, path: &Path, plaintext: &[u8]) -> Result<()> {
        let container = self.seal(plaintext)?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no parent", path.display())))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&container)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        trace!(path = %path.display(), bytes = container.len(), "Wrote container");
        Ok(())
    }
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("root", &self.root)
            .field("key", &"<redacted>")
            .field("inner_iterations", &self.record.inner_iterations)
            .field("salt_size", &self.record.salt_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::listing::tests::test_mount;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_container_replaces_file() {
        let dir = TempDir::new().unwrap();
        let mount = test_mount(dir.path());
        let path = dir.path().join("container");

        mount.write_container(&path, b"one").unwrap();
        let before = fs::metadata(&path).unwrap();

        mount.write_container(&path, b"two").unwrap();
        let after = fs::metadata(&path).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_ne!(before.ino(), after.ino());
        }
        assert_eq!(mount.read_container(&path).unwrap(), b"two");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("container")]);
    }

    #[test]
    fn test_write_container_missing_dir() {
        let dir = TempDir::new().unwrap();
        let mount = test_mount(dir.path());
        let path = dir.path().join("gone").join("container");

        assert!(mount.write_container(&path, b"x").unwrap_err().is_not_found());
        assert!(!path.exists());
    }
}
