//! Editing a file through a plaintext copy in RAM.
//!
//! ```text
//! Idle -> Decrypted -> Watching -> Encrypting -> Done
//! ```
//!
//! `start` decrypts the container, writes the plaintext to a fresh file in the
//! RAM directory and starts the write-back worker. `stop` stops the worker,
//! re-encrypts the copy one last time, and deletes it. `stop` runs on every
//! exit path of [`RamEditSession::with_path`] and [`RamEditSession::run`], and
//! on drop of a session that is still watching.

use crate::config::{RAM_FILE_PREFIX, RAM_FILE_SUFFIX};
use crate::edit::watcher::{write_back, WriteBack};
use crate::error::{Error, Result};
use crate::fs::Mount;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Lifecycle of a [`RamEditSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Decrypted,
    Watching,
    Encrypting,
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Decrypted => "decrypted",
            SessionState::Watching => "watching",
            SessionState::Encrypting => "encrypting",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct RamEditSession {
    mount: Arc<Mount>,
    container: PathBuf,
    ram_dir: PathBuf,
    state: SessionState,
    ram_path: Option<TempPath>,
    write_back: Option<WriteBack>,
}

impl RamEditSession {
    /// Prepare a session for the container at `container`. Nothing is
    /// decrypted until [`start`](Self::start).
    pub fn new(mount: Arc<Mount>, container: PathBuf, ram_dir: PathBuf) -> Self {
        Self {
            mount,
            container,
            ram_dir,
            state: SessionState::Idle,
            ram_path: None,
            write_back: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The plaintext copy, while the session is watching.
    pub fn ram_path(&self) -> Option<&Path> {
        self.ram_path.as_deref()
    }

    /// The encrypted original.
    pub fn container(&self) -> &Path {
        &self.container
    }

    /// Materialize the plaintext copy and start write-back. Returns the path
    /// of the copy.
    ///
    /// On failure nothing stays behind and the session is back to `Idle`.
    pub fn start(&mut self) -> Result<PathBuf> {
        if self.state != SessionState::Idle {
            return Err(Error::Session(format!(
                "cannot start a session that is {}",
                self.state
            )));
        }

        let plain = Zeroizing::new(self.mount.read_container(&self.container)?);
        self.state = SessionState::Decrypted;

        match self.materialize(&plain) {
            Ok(path) => {
                self.state = SessionState::Watching;
                info!(path = %path.display(), "RAM edit session started");
                Ok(path)
            }
            Err(e) => {
                self.write_back = None;
                self.ram_path = None;
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    fn materialize(&mut self, plain: &[u8]) -> Result<PathBuf> {
        let ram_dir = self.ram_dir.canonicalize()?;
        let mut file = tempfile::Builder::new()
            .prefix(RAM_FILE_PREFIX)
            .suffix(RAM_FILE_SUFFIX)
            .tempfile_in(&ram_dir)?;
        file.write_all(plain)?;
        file.flush()?;

        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        self.ram_path = Some(temp);
        debug!(path = %path.display(), bytes = plain.len(), "Wrote RAM copy");

        self.write_back = Some(WriteBack::spawn(
            self.mount.clone(),
            path.clone(),
            self.container.clone(),
        )?);
        Ok(path)
    }

    /// Stop write-back, re-encrypt the copy, and delete it.
    ///
    /// Every step runs even if an earlier one failed; the first failure is
    /// returned. A session that is not watching is left as is.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Watching {
            return Ok(());
        }

        let mut first_error: Option<Error> = None;
        let mut record = |result: Result<()>| {
            if let Err(e) = result {
                warn!(error = %e, "RAM edit session cleanup step failed");
                first_error.get_or_insert(e);
            }
        };

        if let Some(worker) = self.write_back.take() {
            record(worker.stop());
        }

        self.state = SessionState::Encrypting;
        if let Some(path) = self.ram_path.take() {
            record(write_back(&self.mount, &path, &self.container));
            record(path.close().map_err(Error::from));
        }

        self.state = SessionState::Done;
        info!(path = %self.container.display(), "RAM edit session ended");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run `f` against the plaintext copy, then stop the session whatever
    /// `f` returned. An error from `f` takes precedence over a cleanup error.
    pub fn with_path<T>(&mut self, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let path = self.start()?;
        let result = f(&path);
        let stopped = self.stop();

        match (result, stopped) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!(error = %cleanup, "Cleanup also failed after edit error");
                Err(e)
            }
        }
    }

    /// Run `command <ram path>` through the shell and wait for it.
    pub fn run(&mut self, command: &str) -> Result<()> {
        self.with_path(|path| run_command(command, path))
    }
}

/// Run `command` with `path` appended as its last argument.
fn run_command(command: &str, path: &Path) -> Result<()> {
    debug!(command = %command, "Running edit command");
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{} \"$1\"", command))
        .arg("sh")
        .arg(path)
        .status()?;

    if !status.success() {
        return Err(Error::CommandFailed {
            command: command.to_string(),
            status,
        });
    }
    Ok(())
}

impl Drop for RamEditSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop RAM edit session on drop");
        }
    }
}

impl fmt::Debug for RamEditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RamEditSession")
            .field("container", &self.container)
            .field("ram_dir", &self.ram_dir)
            .field("state", &self.state)
            .field("ram_path", &self.ram_path())
            .finish()
    }
}
