//! The filesystem façade: logical paths in, opaque on-disk layout out.

use crate::config::{default_ram_dir, FsConfig};
use crate::edit::RamEditSession;
use crate::error::{Error, Result};
use crate::fs::directory::Directory;
use crate::fs::file::{EncryptedFile, OpenMode};
use crate::fs::ids::{IdSource, RandomIds};
use crate::fs::master;
use crate::fs::mount::Mount;
use crate::fs::path::LogicalPath;
use crate::fs::verify::{verify_tree, VerifyReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// What a listed name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.write_str("file"),
            EntryKind::Directory => f.write_str("directory"),
        }
    }
}

/// A mounted encrypted tree.
///
/// Paths are `/`-separated plaintext names relative to the root; the leading
/// separator is optional. Every intermediate segment must name an existing
/// directory, otherwise the operation fails with `NotFound`.
///
/// Structural changes to the same directory must not run concurrently: each
/// listing update is a plain load, modify and store.
#[derive(Debug, Clone)]
pub struct Filesystem {
    mount: Arc<Mount>,
    ram_dir: PathBuf,
}

impl Filesystem {
    /// Create a new filesystem at `root` and mount it.
    ///
    /// `root` must be missing or empty.
    pub fn create(secret: &[u8], root: &Path, config: FsConfig) -> Result<Self> {
        master::create(secret, root, &config)?;
        Self::mount(secret, root, config.outer_iterations)
    }

    /// Mount an existing filesystem.
    ///
    /// A wrong secret or wrong `outer_iterations` fails with
    /// `Authentication`; a root without a master record with `NotFound`.
    pub fn mount(secret: &[u8], root: &Path, outer_iterations: u32) -> Result<Self> {
        Self::mount_with_ids(secret, root, outer_iterations, Arc::new(RandomIds))
    }

    /// Mount with a caller-supplied identifier source.
    pub fn mount_with_ids(
        secret: &[u8],
        root: &Path,
        outer_iterations: u32,
        ids: Arc<dyn IdSource>,
    ) -> Result<Self> {
        let (record, key) = master::mount(secret, root, outer_iterations)?;
        let mount = Mount::new(root.to_path_buf(), key, record, ids);
        Ok(Self {
            mount: Arc::new(mount),
            ram_dir: default_ram_dir(),
        })
    }

    /// Whether a filesystem has been created at `root`.
    pub fn is_created(root: &Path) -> bool {
        master::exists(root)
    }

    pub fn root(&self) -> &Path {
        self.mount.root()
    }

    /// The shared mount session.
    pub fn mount_session(&self) -> &Arc<Mount> {
        &self.mount
    }

    /// Where RAM edit sessions place plaintext copies.
    pub fn ram_dir(&self) -> &Path {
        &self.ram_dir
    }

    pub fn set_ram_dir(&mut self, dir: impl Into<PathBuf>) {
        self.ram_dir = dir.into();
    }

    /// Resolve every segment but the last, returning the directory holding
    /// the last segment and that segment.
    pub fn resolve(&self, path: &str) -> Result<(Directory, String)> {
        let logical = LogicalPath::parse(path)?;
        let (parents, name) = logical
            .split_last()
            .ok_or_else(|| Error::InvalidPath("the root has no name".to_string()))?;

        let dir = self.walk(parents)?;
        trace!(path = %logical, dir = %dir.path().display(), "Resolved path");
        Ok((dir, name.to_string()))
    }

    /// Resolve every segment as a directory. The empty path is the root.
    pub fn resolve_directory(&self, path: &str) -> Result<Directory> {
        let logical = LogicalPath::parse(path)?;
        self.walk(logical.components())
    }

    fn walk(&self, segments: &[String]) -> Result<Directory> {
        let mut dir = Directory::root(self.mount.clone());
        for segment in segments {
            dir = dir.child(segment)?;
        }
        Ok(dir)
    }

    /// Create the directory at `path`. Its parent must exist.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let (dir, name) = self.resolve(path)?;
        dir.mkdir(&name)?;
        Ok(())
    }

    /// Open the file at `path`.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<EncryptedFile> {
        let (dir, name) = self.resolve(path)?;
        dir.files().open(&name, mode)
    }

    /// Whole content of the file at `path`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.open(path, OpenMode::Read)?;
        Ok(file.contents().to_vec())
    }

    /// Replace the content of the file at `path`, creating it if absent.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = self.open(path, OpenMode::Write)?;
        file.write_all(data)?;
        file.close()
    }

    /// Prepare a RAM edit session for the file at `path`, creating an empty
    /// file if it is absent. Call [`RamEditSession::start`],
    /// [`RamEditSession::with_path`] or [`RamEditSession::run`] on the result.
    pub fn open_as_ram_edit(&self, path: &str) -> Result<RamEditSession> {
        let (dir, name) = self.resolve(path)?;
        let container = dir.files().ensure(&name)?;
        Ok(RamEditSession::new(
            self.mount.clone(),
            container,
            self.ram_dir.clone(),
        ))
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        let (dir, name) = self.resolve(path)?;
        dir.files().rm(&name)
    }

    /// Remove the directory at `path`. Without `recursive` it must be empty.
    pub fn remove_directory(&self, path: &str, recursive: bool) -> Result<()> {
        let (dir, name) = self.resolve(path)?;
        dir.rm(&name, recursive)
    }

    pub fn exists_file(&self, path: &str) -> Result<bool> {
        let (dir, name) = self.resolve(path)?;
        dir.files().exists(&name)
    }

    pub fn exists_directory(&self, path: &str) -> Result<bool> {
        let (dir, name) = self.resolve(path)?;
        dir.exists(&name)
    }

    /// Entries of the directory at `path`.
    ///
    /// A name used by both a file and a directory is reported as a file.
    pub fn list(&self, path: &str) -> Result<BTreeMap<String, EntryKind>> {
        let dir = self.resolve_directory(path)?;
        let mut out = BTreeMap::new();

        for name in dir.ls()? {
            out.insert(name, EntryKind::Directory);
        }
        for name in dir.files().ls()? {
            out.insert(name, EntryKind::File);
        }
        Ok(out)
    }

    /// Check every container in the tree. See [`VerifyReport`].
    pub fn verify(&self) -> Result<VerifyReport> {
        verify_tree(&self.mount)
    }
}
