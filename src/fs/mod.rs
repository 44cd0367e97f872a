//! The encrypted tree.
//!
//! On disk every directory holds up to two listings, `.directories` and
//! `.files`, mapping plaintext names to opaque identifiers, plus one entry per
//! identifier: a real subdirectory or a file container. The root also holds
//! the master record `.fernet`.

mod directory;
mod file;
mod filesystem;
mod ids;
pub(crate) mod listing;
pub mod master;
mod mount;
mod path;
mod verify;

pub use directory::Directory;
pub use file::{EncryptedFile, FileManager, OpenMode};
pub use filesystem::{EntryKind, Filesystem};
pub use ids::{is_opaque_id, IdSource, RandomIds};
pub use listing::{Entries, Listing, ListingKind};
pub use master::MasterRecord;
pub use mount::Mount;
pub use path::{validate_segment, LogicalPath};
pub use verify::{verify_tree, VerifyReport};
