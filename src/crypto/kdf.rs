//! PBKDF2-HMAC-SHA256 key derivation.

use crate::config::CONTAINER_KEY_LENGTH;
use crate::error::{Error, Result};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Stretch `secret` into `output_length` bytes.
///
/// Deterministic for identical inputs. A wrong secret still derives a key;
/// it is the container's authentication check that rejects it.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
    output_length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if iterations == 0 {
        return Err(Error::KeyDerivation(
            "Iteration count must be greater than 0".to_string(),
        ));
    }
    if output_length == 0 {
        return Err(Error::KeyDerivation(
            "Output length must be greater than 0".to_string(),
        ));
    }

    let mut key = Zeroizing::new(vec![0u8; output_length]);
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut key);
    Ok(key)
}

/// Key derivation bound to one salt.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    salt: Vec<u8>,
    iterations: u32,
}

impl KeyDerivation {
    /// Create a KDF with a fresh random salt of `salt_size` bytes.
    pub fn new(salt_size: usize, iterations: u32) -> Self {
        Self {
            salt: random_bytes(salt_size),
            iterations,
        }
    }

    /// Create a KDF from an existing salt (for decryption).
    pub fn from_salt(salt: Vec<u8>, iterations: u32) -> Self {
        Self { salt, iterations }
    }

    /// Get the salt for storage.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Derive `output_length` bytes from `secret`.
    pub fn derive(&self, secret: &[u8], output_length: usize) -> Result<Zeroizing<Vec<u8>>> {
        derive_key(secret, &self.salt, self.iterations, output_length)
    }

    /// Derive a 256-bit container key from `secret`.
    pub fn derive_cipher_key(&self, secret: &[u8]) -> Result<Zeroizing<[u8; CONTAINER_KEY_LENGTH]>> {
        let derived = self.derive(secret, CONTAINER_KEY_LENGTH)?;
        let mut key = Zeroizing::new([0u8; CONTAINER_KEY_LENGTH]);
        key.copy_from_slice(&derived);
        Ok(key)
    }
}

/// Fill a buffer of `len` bytes from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation_deterministic() {
        let kdf = KeyDerivation::from_salt(vec![1u8; 16], 100);

        let key1 = kdf.derive(b"password123", 256).unwrap();
        let key2 = kdf.derive(b"password123", 256).unwrap();

        assert_eq!(key1, key2);
        assert_eq!(key1.len(), 256);
    }

    #[test]
    fn test_different_passwords_different_keys() {
        let kdf = KeyDerivation::from_salt(vec![2u8; 16], 100);

        let key1 = kdf.derive_cipher_key(b"password1").unwrap();
        let key2 = kdf.derive_cipher_key(b"password2").unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_different_salts_different_keys() {
        let key1 = derive_key(b"password", &[1u8; 16], 100, 32).unwrap();
        let key2 = derive_key(b"password", &[2u8; 16], 100, 32).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_iterations_change_key() {
        let key1 = derive_key(b"password", &[1u8; 16], 100, 32).unwrap();
        let key2 = derive_key(b"password", &[1u8; 16], 101, 32).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_rfc6070_style_vector() {
        // PBKDF2-HMAC-SHA256, P="password", S="salt", c=1, dkLen=32
        let key = derive_key(b"password", b"salt", 1, 32).unwrap();
        assert_eq!(
            hex::encode(&*key),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(matches!(
            derive_key(b"password", b"salt", 0, 32),
            Err(Error::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_new_generates_random_salt() {
        let kdf1 = KeyDerivation::new(16, 100);
        let kdf2 = KeyDerivation::new(16, 100);

        assert_eq!(kdf1.salt().len(), 16);
        assert_ne!(kdf1.salt(), kdf2.salt());
    }
}
