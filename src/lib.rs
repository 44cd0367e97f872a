//! fernetfs
//!
//! An encrypted filesystem overlay: a logical tree of plaintext names is
//! stored inside an ordinary host directory, where every name is replaced by
//! a random 64-character identifier and every name listing and file content
//! is an authenticated, encrypted container.
//!
//! # Features
//!
//! - **Opaque layout**: on disk only random identifiers, `.directories` and
//!   `.files` listings, and the root `.fernet` master record are visible
//! - **AES-256-GCM containers**: each with its own PBKDF2-HMAC-SHA256 salt
//! - **Two-tier keys**: the user secret unlocks the master record; a working
//!   key derived from it keys everything else
//! - **RAM editing**: edit a decrypted copy in `/dev/shm` while a background
//!   worker keeps the encrypted original up to date
//!
//! # Architecture
//!
//! ```text
//! secret ─PBKDF2─▶ .fernet (master salt) ─PBKDF2─▶ working key
//! working key ─▶ .directories / .files / <opaque id> containers
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use fernetfs::{Filesystem, FsConfig};
//! use std::path::Path;
//!
//! let fs = Filesystem::create(b"password", Path::new("./vault"), FsConfig::default()).unwrap();
//!
//! fs.mkdir("/docs").unwrap();
//! fs.write("/docs/a.txt", b"hello").unwrap();
//!
//! let data = fs.read("/docs/a.txt").unwrap();
//! assert_eq!(data, b"hello");
//! ```

pub mod config;
pub mod crypto;
pub mod edit;
pub mod error;
pub mod fs;

pub use config::FsConfig;
pub use edit::{RamEditSession, SessionState};
pub use error::{Error, Result};
pub use fs::{EntryKind, Filesystem, OpenMode, VerifyReport};
