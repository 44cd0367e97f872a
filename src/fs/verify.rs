//! Read-only integrity check of a mounted tree.

use crate::config::{DIRECTORIES_FILENAME, FILES_FILENAME, MASTER_FILENAME};
use crate::error::{Error, Result};
use crate::fs::listing::{Listing, ListingKind};
use crate::fs::mount::Mount;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of [`verify_tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Directories visited.
    pub directories: usize,
    /// Containers that decrypted and authenticated.
    pub containers_verified: usize,
    /// Containers that failed to authenticate or parse.
    pub failed: Vec<PathBuf>,
    /// On-disk entries no listing refers to.
    pub orphans: Vec<PathBuf>,
    /// Listing entries whose on-disk entry is missing.
    pub dangling: Vec<PathBuf>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.orphans.is_empty() && self.dangling.is_empty()
    }
}

/// Walk every directory below the mount root and try to open every listing
/// and file container. Nothing is modified.
pub fn verify_tree(mount: &Arc<Mount>) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for entry in WalkDir::new(mount.root()).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            verify_directory(mount, entry.path(), &mut report)?;
        }
    }

    debug!(
        directories = report.directories,
        verified = report.containers_verified,
        failed = report.failed.len(),
        orphans = report.orphans.len(),
        dangling = report.dangling.len(),
        "Verified tree"
    );
    Ok(report)
}

fn verify_directory(mount: &Arc<Mount>, dir: &Path, report: &mut VerifyReport) -> Result<()> {
    report.directories += 1;
    let mut referenced: HashSet<String> = HashSet::new();
    let mut readable = true;

    for kind in [ListingKind::Directories, ListingKind::Files] {
        let listing = Listing::new(mount.clone(), dir, kind);
        if !listing.exists() {
            continue;
        }

        let entries = match listing.read() {
            Ok(entries) => entries,
            Err(e) if is_integrity_error(&e) => {
                warn!(path = %listing.path().display(), error = %e, "Listing failed verification");
                report.failed.push(listing.path().to_path_buf());
                readable = false;
                continue;
            }
            Err(e) => return Err(e),
        };
        report.containers_verified += 1;

        for id in entries.into_values() {
            let target = dir.join(&id);
            referenced.insert(id);

            if !target.exists() {
                report.dangling.push(target);
                continue;
            }
            if kind == ListingKind::Files {
                match mount.read_container(&target) {
                    Ok(_) => report.containers_verified += 1,
                    Err(e) if is_integrity_error(&e) => {
                        warn!(path = %target.display(), error = %e, "File failed verification");
                        report.failed.push(target);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    // Without every listing readable, unreferenced entries prove nothing.
    if !readable {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_reserved(&name, dir == mount.root()) || referenced.contains(&name) {
            continue;
        }
        report.orphans.push(entry.path());
    }
    Ok(())
}

fn is_reserved(name: &str, at_root: bool) -> bool {
    name == DIRECTORIES_FILENAME || name == FILES_FILENAME || (at_root && name == MASTER_FILENAME)
}

fn is_integrity_error(e: &Error) -> bool {
    matches!(e, Error::Authentication | Error::Format(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::directory::Directory;
    use crate::fs::listing::tests::test_mount;
    use std::io::Write;
    use tempfile::TempDir;

    fn populated(dir: &TempDir) -> (Arc<Mount>, Directory) {
        let mount = test_mount(dir.path());
        let root = Directory::root(mount.clone());
        root.mkdir("docs").unwrap();
        let docs = root.child("docs").unwrap();
        let mut f = docs
            .files()
            .open("a.txt", crate::fs::file::OpenMode::Write)
            .unwrap();
        f.write_all(b"hello").unwrap();
        f.close().unwrap();
        (mount, docs)
    }

    #[test]
    fn test_clean_tree() {
        let dir = TempDir::new().unwrap();
        let (mount, _) = populated(&dir);

        let report = verify_tree(&mount).unwrap();
        assert!(report.is_clean(), "{:?}", report);
        assert_eq!(report.directories, 2);
        // root .directories, docs .files, a.txt
        assert_eq!(report.containers_verified, 3);
    }

    #[test]
    fn test_tampered_file_fails() {
        let dir = TempDir::new().unwrap();
        let (mount, docs) = populated(&dir);
        let path = docs.files().container_path("a.txt").unwrap();
        fs::write(&path, b"{\"salt\":\"AAAA\",\"data\":\"AAAA\"}").unwrap();

        let report = verify_tree(&mount).unwrap();
        assert_eq!(report.failed, vec![path]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_orphan_and_dangling() {
        let dir = TempDir::new().unwrap();
        let (mount, docs) = populated(&dir);

        let stray = docs.path().join(format!("{:064x}", 999));
        fs::write(&stray, b"junk").unwrap();
        let file = docs.files().container_path("a.txt").unwrap();
        fs::remove_file(&file).unwrap();

        let report = verify_tree(&mount).unwrap();
        assert_eq!(report.orphans, vec![stray]);
        assert_eq!(report.dangling, vec![file]);
        assert!(report.failed.is_empty());
    }
}
