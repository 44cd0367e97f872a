//! Background write-back of a RAM plaintext copy into its container.
//!
//! The worker blocks on one channel fed by both the change-notification
//! callback and [`WriteBack::stop`], so a stop request is seen even when no
//! further filesystem event ever arrives. Events queued before the stop
//! request are handled first.

use crate::error::{Error, Result};
use crate::fs::Mount;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

enum Signal {
    Fs(notify::Result<Event>),
    Stop,
}

/// A running write-back worker.
pub(crate) struct WriteBack {
    watcher: Option<RecommendedWatcher>,
    stop: Sender<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl WriteBack {
    /// Watch `ram_path` and re-encrypt it into `container` after every save.
    pub fn spawn(mount: Arc<Mount>, ram_path: PathBuf, container: PathBuf) -> Result<Self> {
        let watch_dir = ram_path
            .parent()
            .ok_or_else(|| Error::Session(format!("{} has no parent", ram_path.display())))?
            .to_path_buf();

        let (tx, rx) = mpsc::channel();

        let events = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = events.send(Signal::Fs(res));
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        let handle = thread::Builder::new()
            .name("fernetfs-write-back".to_string())
            .spawn(move || {
                debug!(path = %ram_path.display(), "Write-back started");
                for signal in rx {
                    match signal {
                        Signal::Stop => break,
                        Signal::Fs(Ok(event)) if is_save_of(&event, &ram_path) => {
                            trace!(kind = ?event.kind, "Save detected");
                            if let Err(e) = write_back(&mount, &ram_path, &container) {
                                warn!(path = %ram_path.display(), error = %e, "Write-back failed");
                            }
                        }
                        Signal::Fs(Ok(_)) => {}
                        Signal::Fs(Err(e)) => {
                            warn!(error = %e, "Change notification error");
                        }
                    }
                }
                debug!(path = %ram_path.display(), "Write-back stopped");
            })?;

        Ok(Self {
            watcher: Some(watcher),
            stop: tx,
            handle: Some(handle),
        })
    }

    /// Stop watching and wait for the worker to finish any pending write-back.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        // Dropping the watcher first stops new events from being queued.
        self.watcher.take();
        let _ = self.stop.send(Signal::Stop);

        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Session("write-back thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for WriteBack {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Write-back shutdown failed");
        }
    }
}

/// Whether `event` means `target` was just saved: closed after a write, or
/// renamed into place by an editor that saves atomically.
fn is_save_of(event: &Event, target: &Path) -> bool {
    let saved = matches!(
        event.kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    );
    saved && event.paths.last().is_some_and(|p| p == target)
}

/// Encrypt the current content of `ram_path` into `container`.
pub(crate) fn write_back(mount: &Mount, ram_path: &Path, container: &Path) -> Result<()> {
    let plain = Zeroizing::new(fs::read(ram_path)?);
    mount.write_container(container, &plain)?;
    debug!(path = %container.display(), bytes = plain.len(), "Wrote back RAM copy");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::listing::tests::test_mount;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_is_save_of() {
        let target = Path::new("/dev/shm/fernetfs-x.plain");
        let other = Path::new("/dev/shm/other.plain");

        let close_write = EventKind::Access(AccessKind::Close(AccessMode::Write));
        assert!(is_save_of(&event(close_write, target), target));
        assert!(!is_save_of(&event(close_write, other), target));

        let moved_in = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        assert!(is_save_of(&event(moved_in, target), target));

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(other.to_path_buf())
            .add_path(target.to_path_buf());
        assert!(is_save_of(&both, target));

        let close_read = EventKind::Access(AccessKind::Close(AccessMode::Read));
        assert!(!is_save_of(&event(close_read, target), target));
    }

    #[test]
    fn test_write_back_encrypts() {
        let dir = TempDir::new().unwrap();
        let mount = test_mount(dir.path());
        let ram = dir.path().join("copy.plain");
        let container = dir.path().join("container");
        fs::write(&ram, b"edited").unwrap();

        write_back(&mount, &ram, &container).unwrap();
        assert_eq!(mount.read_container(&container).unwrap(), b"edited");
    }

    #[test]
    fn test_stop_without_events_returns() {
        let dir = TempDir::new().unwrap();
        let mount = test_mount(dir.path());
        let ram = dir.path().join("copy.plain");
        fs::write(&ram, b"x").unwrap();

        let started = Instant::now();
        let worker = WriteBack::spawn(mount, ram, dir.path().join("container")).unwrap();
        worker.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
