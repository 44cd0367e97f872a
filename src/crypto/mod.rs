//! Cryptographic operations for fernetfs.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key stretching
//! - AES-256-GCM authenticated encryption inside salted containers

mod container;
mod kdf;

pub(crate) use container::b64;
pub use container::{
    decrypt, decrypt_file, encrypt, encrypt_file, verify_file, Cipher, Container,
};
pub use kdf::{derive_key, random_bytes, KeyDerivation};
