//! Encrypted listings: plaintext name to opaque identifier.
//!
//! Each directory holds at most one listing per kind, `.directories` for
//! subdirectories and `.files` for files. A missing listing is an empty one,
//! and an emptied listing is deleted rather than written, so a listing file
//! on disk always has at least one entry.
//!
//! Every operation is a load/mutate/store cycle against the file on disk.
//! There is no locking: two writers updating the same listing concurrently
//! can lose an update, so callers must serialize structural changes to a
//! directory.

use crate::config::{DIRECTORIES_FILENAME, FILES_FILENAME};
use crate::error::{Error, Result};
use crate::fs::ids::is_opaque_id;
use crate::fs::mount::Mount;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Name to opaque identifier mapping.
pub type Entries = BTreeMap<String, String>;

/// Which listing of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Directories,
    Files,
}

impl ListingKind {
    /// Well-known file name of this listing within its directory.
    pub fn filename(self) -> &'static str {
        match self {
            ListingKind::Directories => DIRECTORIES_FILENAME,
            ListingKind::Files => FILES_FILENAME,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Listing {
    mount: Arc<Mount>,
    path: PathBuf,
    kind: ListingKind,
}

impl Listing {
    pub fn new(mount: Arc<Mount>, dir: &Path, kind: ListingKind) -> Self {
        Self {
            mount,
            path: dir.join(kind.filename()),
            kind,
        }
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    /// Path of the listing container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current mapping, empty if no listing has been written yet.
    pub fn get(&self) -> Result<Entries> {
        if self.exists() {
            self.read()
        } else {
            Ok(Entries::new())
        }
    }

    /// Insert `name` with a fresh opaque identifier and return the identifier.
    ///
    /// Only touches `entries`; the caller persists it.
    pub fn add(&self, name: &str, entries: &mut Entries) -> Result<String> {
        if entries.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let id = self.mount.next_id();
        trace!(name = %name, id = %id, kind = ?self.kind, "Add listing entry");
        entries.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Decrypt and parse the listing container.
    pub fn read(&self) -> Result<Entries> {
        let payload = self.mount.read_container(&self.path)?;
        let entries: Entries = serde_json::from_slice(&payload)?;

        if let Some((name, id)) = entries.iter().find(|(_, id)| !is_opaque_id(id)) {
            return Err(Error::Format(format!(
                "listing entry {} has a malformed identifier {}",
                name, id
            )));
        }

        debug!(path = %self.path.display(), entries = entries.len(), "Read listing");
        Ok(entries)
    }

    /// Serialize and encrypt `entries` into the listing container.
    pub fn write(&self, entries: &Entries) -> Result<()> {
        let payload = serde_json::to_vec(entries)?;
        self.mount.write_container(&self.path, &payload)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Wrote listing");
        Ok(())
    }

    /// Delete the listing container.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "Removed empty listing");
        Ok(())
    }

    /// Persist `entries`, deleting the container instead when it is empty.
    pub fn store(&self, entries: &Entries) -> Result<()> {
        if !entries.is_empty() {
            self.write(entries)
        } else if self.exists() {
            self.remove()
        } else {
            Ok(())
        }
    }
}
