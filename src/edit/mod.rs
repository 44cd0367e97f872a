//! RAM-backed editing of encrypted files.
//!
//! This is the only concurrent part of the crate: a foreground caller edits
//! the plaintext copy while a background worker keeps the encrypted original
//! in sync.

mod session;
mod watcher;

pub use session::{RamEditSession, SessionState};
