//! Opaque identifier generation.

use crate::config::{OPAQUE_ID_LENGTH, OPAQUE_ID_RANDOM_BYTES};
use crate::crypto::random_bytes;
use sha2::{Digest, Sha256};

/// Source of opaque on-disk identifiers.
///
/// Identifiers must be 64 lowercase hex characters and unguessable.
/// Tests may substitute a deterministic source.
pub trait IdSource: Send + Sync {
    /// Produce a fresh identifier.
    fn next_id(&self) -> String;
}

/// Default source: SHA-256 of 32 bytes from the CSPRNG, hex-encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> String {
        let seed = random_bytes(OPAQUE_ID_RANDOM_BYTES);
        hex::encode(Sha256::digest(&seed))
    }
}

/// Check that `name` has the shape of an opaque identifier.
pub fn is_opaque_id(name: &str) -> bool {
    name.len() == OPAQUE_ID_LENGTH
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_ids_shape() {
        let id = RandomIds.next_id();
        assert_eq!(id.len(), 64);
        assert!(is_opaque_id(&id));
    }

    #[test]
    fn test_random_ids_unique() {
        let ids: HashSet<String> = (0..100).map(|_| RandomIds.next_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_is_opaque_id() {
        assert!(is_opaque_id(&"a".repeat(64)));
        assert!(!is_opaque_id(&"a".repeat(63)));
        assert!(!is_opaque_id(&"A".repeat(64)));
        assert!(!is_opaque_id(".directories"));
    }
}
