//! Files of one directory, addressed by plaintext name.

use crate::error::{Error, Result};
use crate::fs::listing::{Entries, Listing, ListingKind};
use crate::fs::mount::Mount;
use crate::fs::path::validate_segment;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use zeroize::Zeroize;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Decrypt existing content; the file must exist.
    Read,
    /// Start empty; encrypted on close.
    Write,
    /// Start from the existing content, or empty; encrypted on close.
    Append,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    /// Accepts the classic mode strings; `b` and `t` flags are ignored since
    /// handles are always byte streams.
    fn from_str(s: &str) -> Result<Self> {
        let mode: String = s.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
        match mode.as_str() {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            _ => Err(Error::InvalidConfig(format!("unknown open mode {:?}", s))),
        }
    }
}

/// The file listing of one directory plus the containers it points to.
#[derive(Debug, Clone)]
pub struct FileManager {
    mount: Arc<Mount>,
    dir: PathBuf,
    listing: Listing,
}

impl FileManager {
    pub fn new(mount: Arc<Mount>, dir: &Path) -> Self {
        let listing = Listing::new(mount.clone(), dir, ListingKind::Files);
        Self {
            mount,
            dir: dir.to_path_buf(),
            listing,
        }
    }

    /// Open `name`.
    ///
    /// Read mode fails with `NotFound` if the file is absent. Write and append
    /// register a new identifier for an absent name.
    pub fn open(&self, name: &str, mode: OpenMode) -> Result<EncryptedFile> {
        validate_segment(name)?;
        let mut entries = self.listing.get()?;

        let id = match entries.get(name) {
            Some(id) => id.clone(),
            None if mode == OpenMode::Read => {
                return Err(Error::NotFound(format!("no file named {}", name)));
            }
            None => {
                let id = self.listing.add(name, &mut entries)?;
                self.listing.write(&entries)?;
                id
            }
        };

        let path = self.dir.join(&id);
        debug!(path = %path.display(), ?mode, "Opening file");

        if mode == OpenMode::Read && !self.exists(name)? {
            return Err(Error::NotFound(format!("no file named {}", name)));
        }

        EncryptedFile::open(self.mount.clone(), path, mode)
    }

    /// Names of all files.
    pub fn ls(&self) -> Result<Vec<String>> {
        Ok(self.listing.get()?.into_keys().collect())
    }

    /// Whether `name` is listed and its backing container is present.
    ///
    /// A listed name whose container is missing (an interrupted earlier
    /// operation) is dropped from the listing before returning `false`.
    pub fn exists(&self, name: &str) -> Result<bool> {
        validate_segment(name)?;
        let mut entries = self.listing.get()?;

        let Some(id) = entries.get(name) else {
            trace!(name = %name, "File is not listed");
            return Ok(false);
        };

        let path = self.dir.join(id);
        if !path.exists() {
            warn!(path = %path.display(), "Listed file is missing on disk, dropping entry");
            entries.remove(name);
            self.listing.store(&entries)?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Remove `name` and its container.
    pub fn rm(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Err(Error::NotFound(format!("no file named {}", name)));
        }

        let mut entries = self.listing.get()?;
        let id = entries
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("no file named {}", name)))?;

        fs::remove_file(self.dir.join(&id))?;
        self.listing.store(&entries)?;
        debug!(id = %id, "Removed file");
        Ok(())
    }

    /// Opaque identifier of `name`.
    pub fn opaque_id(&self, name: &str) -> Result<String> {
        validate_segment(name)?;
        lookup(&self.listing.get()?, name)
    }

    /// On-disk container path of an existing file.
    pub fn container_path(&self, name: &str) -> Result<PathBuf> {
        if !self.exists(name)? {
            return Err(Error::NotFound(format!("no file named {}", name)));
        }
        Ok(self.dir.join(self.opaque_id(name)?))
    }

    /// Container path of `name`, creating an empty file first if absent.
    pub fn ensure(&self, name: &str) -> Result<PathBuf> {
        if !self.exists(name)? {
            debug!("Creating empty file for RAM edit");
            self.open(name, OpenMode::Write)?.close()?;
        }
        self.container_path(name)
    }

    pub(crate) fn listing(&self) -> &Listing {
        &self.listing
    }
}

fn lookup(entries: &Entries, name: &str) -> Result<String> {
    entries
        .get(name)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("no file named {}", name)))
}

/// Open file contents, held in memory and encrypted as a whole on close.
pub struct EncryptedFile {
    mount: Arc<Mount>,
    path: PathBuf,
    mode: OpenMode,
    buffer: Cursor<Vec<u8>>,
    closed: bool,
}

impl EncryptedFile {
    fn open(mount: Arc<Mount>, path: PathBuf, mode: OpenMode) -> Result<Self> {
        let data = match mode {
            OpenMode::Read => mount.read_container(&path)?,
            OpenMode::Write => Vec::new(),
            OpenMode::Append => match mount.read_container(&path) {
                Ok(data) => data,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            },
        };

        let mut buffer = Cursor::new(data);
        if mode == OpenMode::Append {
            buffer.seek(SeekFrom::End(0))?;
        }

        Ok(Self {
            mount,
            path,
            mode,
            buffer,
            closed: false,
        })
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Current plaintext content.
    pub fn contents(&self) -> &[u8] {
        self.buffer.get_ref()
    }

    /// Read the remaining content as UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        let mut out = String::new();
        self.read_to_string(&mut out)?;
        Ok(out)
    }

    /// Encrypt and persist the content (writable modes) and release the handle.
    pub fn close(mut self) -> Result<()> {
        self.persist()
    }

    /// Zero the plaintext buffer.
    fn wipe(&mut self) {
        self.buffer.get_mut().zeroize();
        self.buffer.set_position(0);
    }

    fn persist(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.mode.is_writable() {
            debug!(
                path = %self.path.display(),
                bytes = self.buffer.get_ref().len(),
                "Encrypting file on close"
            );
            self.mount
                .write_container(&self.path, self.buffer.get_ref())?;
        }
        Ok(())
    }
}

impl Read for EncryptedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Write for EncryptedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.is_writable() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file opened for reading",
            ));
        }
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for EncryptedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl Drop for EncryptedFile {
    fn drop(&mut self) {
        if let Err(e) = self.persist() {
            warn!(path = %self.path.display(), error = %e, "Failed to encrypt file on drop");
        }
        self.wipe();
    }
}

impl fmt::Debug for EncryptedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("len", &self.buffer.get_ref().len())
            .finish()
    }
}
