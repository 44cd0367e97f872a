//! Directories, addressed by plaintext name.

use crate::error::{Error, Result};
use crate::fs::file::FileManager;
use crate::fs::listing::{Listing, ListingKind};
use crate::fs::mount::Mount;
use crate::fs::path::validate_segment;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One on-disk directory: its subdirectory listing and its files.
#[derive(Debug, Clone)]
pub struct Directory {
    mount: Arc<Mount>,
    path: PathBuf,
    listing: Listing,
    files: FileManager,
}

impl Directory {
    pub fn new(mount: Arc<Mount>, path: PathBuf) -> Self {
        let listing = Listing::new(mount.clone(), &path, ListingKind::Directories);
        let files = FileManager::new(mount.clone(), &path);
        Self {
            mount,
            path,
            listing,
            files,
        }
    }

    /// The root directory of a mount.
    pub fn root(mount: Arc<Mount>) -> Self {
        let path = mount.root().to_path_buf();
        Self::new(mount, path)
    }

    /// On-disk location of this directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Files stored in this directory.
    pub fn files(&self) -> &FileManager {
        &self.files
    }

    /// Create subdirectory `name` and return its opaque identifier.
    pub fn mkdir(&self, name: &str) -> Result<String> {
        validate_segment(name)?;
        let mut entries = self.listing.get()?;

        if entries.contains_key(name) {
            return Err(Error::AlreadyExists(format!("directory {}", name)));
        }

        let id = self.listing.add(name, &mut entries)?;
        let full = self.path.join(&id);
        fs::create_dir(&full)?;
        self.listing.write(&entries)?;

        debug!(path = %full.display(), "Created directory");
        Ok(id)
    }

    /// Names of all subdirectories.
    pub fn ls(&self) -> Result<Vec<String>> {
        Ok(self.listing.get()?.into_keys().collect())
    }

    /// Opaque identifier of subdirectory `name`.
    pub fn opaque_id(&self, name: &str) -> Result<String> {
        validate_segment(name)?;
        self.listing
            .get()?
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("no directory named {}", name)))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        validate_segment(name)?;
        Ok(self.listing.get()?.contains_key(name))
    }

    /// Subdirectory `name` as a `Directory`.
    pub fn child(&self, name: &str) -> Result<Directory> {
        let id = self.opaque_id(name)?;
        Ok(Directory::new(self.mount.clone(), self.path.join(id)))
    }

    /// Remove subdirectory `name`.
    ///
    /// Without `recursive` the OS refuses to remove a directory that still
    /// holds a listing, i.e. any child at all.
    /// With `recursive`, an entry whose folder is already gone is dropped.
    pub fn rm(&self, name: &str, recursive: bool) -> Result<()> {
        validate_segment(name)?;
        let mut entries = self.listing.get()?;

        let id = entries
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("no directory named {}", name)))?;
        let full = self.path.join(&id);

        if recursive {
            match fs::remove_dir_all(&full) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %full.display(), "Listed directory is missing on disk, dropping entry");
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            fs::remove_dir(&full)?;
        }

        self.listing.store(&entries)?;
        debug!(path = %full.display(), recursive, "Removed directory");
        Ok(())
    }
}
