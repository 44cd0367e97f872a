//! AES-256-GCM authenticated encryption and the on-disk container format.
//!
//! Every persisted object is a JSON record with two base64url fields:
//!
//! ```text
//! { "salt": "<random salt>", "data": "<nonce || ciphertext || tag>" }
//! ```
//!
//! The encryption key of each container is derived from the caller's secret
//! and the container's own salt, so containers sharing a secret never share
//! a key.

use crate::config::CipherParams;
use crate::crypto::kdf::{random_bytes, KeyDerivation};
use crate::error::{Error, Result};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits).
const TAG_SIZE: usize = 16;

/// AES-256-GCM cipher wrapper.
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    /// Create a new cipher from a derived key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| Error::Encryption(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt data with a random nonce.
    ///
    /// Returns: nonce (12 bytes) || ciphertext || tag (16 bytes)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes = random_bytes(NONCE_SIZE);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypt data that was encrypted with `encrypt`.
    ///
    /// Truncated input is reported as an authentication failure, like any
    /// other tampering.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Authentication);
        }

        let (nonce_bytes, ciphertext) = ciphertext.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::Authentication)
    }
}

/// Serde adapter storing byte fields as padded base64url strings.
pub(crate) mod b64 {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        URL_SAFE
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A sealed container: the salt its key was derived with, and the
/// authenticated ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Salt for key derivation.
    #[serde(with = "b64")]
    pub salt: Vec<u8>,
    /// The encrypted payload (nonce || ciphertext || tag).
    #[serde(with = "b64")]
    pub data: Vec<u8>,
}

impl Container {
    /// Encrypt `plaintext` under a key derived from `secret` and a fresh salt.
    pub fn seal(secret: &[u8], plaintext: &[u8], params: &CipherParams) -> Result<Self> {
        let kdf = KeyDerivation::new(params.salt_size, params.iterations);
        let key = kdf.derive_cipher_key(secret)?;
        let data = Cipher::new(&key[..])?.encrypt(plaintext)?;

        Ok(Self {
            salt: kdf.salt().to_vec(),
            data,
        })
    }

    /// Re-derive the key from the embedded salt and decrypt.
    pub fn open(&self, secret: &[u8], iterations: u32) -> Result<Vec<u8>> {
        let kdf = KeyDerivation::from_salt(self.salt.clone(), iterations);
        let key = kdf.derive_cipher_key(secret)?;
        Cipher::new(&key[..])?.decrypt(&self.data)
    }

    /// Serialize to the on-disk JSON form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse the on-disk JSON form. Any structural problem is a format error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encrypt `plaintext` into a serialized container.
pub fn encrypt(secret: &[u8], plaintext: &[u8], params: &CipherParams) -> Result<Vec<u8>> {
    Container::seal(secret, plaintext, params)?.to_bytes()
}

/// Decrypt a serialized container.
pub fn decrypt(secret: &[u8], container: &[u8], iterations: u32) -> Result<Vec<u8>> {
    Container::from_bytes(container)?.open(secret, iterations)
}

/// Read the file at `input`, encrypt it, and write the container to `output`.
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    secret: &[u8],
    params: &CipherParams,
) -> Result<()> {
    let plain = fs::read(input)?;
    fs::write(output, encrypt(secret, &plain, params)?)?;
    Ok(())
}

/// Read the container at `input`, decrypt it, and write the plaintext to `output`.
pub fn decrypt_file(input: &Path, output: &Path, secret: &[u8], iterations: u32) -> Result<()> {
    let container = fs::read(input)?;
    fs::write(output, decrypt(secret, &container, iterations)?)?;
    Ok(())
}

/// Check whether the container at `path` authenticates under `secret`.
///
/// Returns `Ok(false)` on an authentication failure; I/O and format
/// problems are still errors.
pub fn verify_file(path: &Path, secret: &[u8], iterations: u32) -> Result<bool> {
    let container = fs::read(path)?;
    match decrypt(secret, &container, iterations) {
        Ok(_) => Ok(true),
        Err(Error::Authentication) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params() -> CipherParams {
        CipherParams::new(100, 16)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"Hello, World! This is a secret message.";
        let secret = b"secure_password_123";

        let container = encrypt(secret, plaintext, &params()).unwrap();
        let decrypted = decrypt(secret, &container, 100).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_secret_fails_authentication() {
        let container = encrypt(b"correct_password", b"Secret data", &params()).unwrap();

        let result = decrypt(b"wrong_password", &container, 100);
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_wrong_iterations_fail_authentication() {
        let container = encrypt(b"password", b"Secret data", &params()).unwrap();

        let result = decrypt(b"password", &container, 101);
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_fresh_salt_per_container() {
        let plaintext = b"Same message";

        let first = Container::seal(b"password", plaintext, &params()).unwrap();
        let second = Container::seal(b"password", plaintext, &params()).unwrap();

        assert_eq!(first.salt.len(), 16);
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn test_empty_plaintext() {
        let container = encrypt(b"password", b"", &params()).unwrap();
        let decrypted = decrypt(b"password", &container, 100).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_tampered_data_fails_authentication() {
        let mut container = Container::seal(b"password", b"Secret data", &params()).unwrap();
        if let Some(byte) = container.data.last_mut() {
            *byte ^= 0xFF;
        }

        assert!(matches!(
            container.open(b"password", 100),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_tampered_salt_fails_authentication() {
        let mut container = Container::seal(b"password", b"Secret data", &params()).unwrap();
        container.salt[0] ^= 0x01;

        assert!(matches!(
            container.open(b"password", 100),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_truncated_data_fails_authentication() {
        let mut container = Container::seal(b"password", b"Secret data", &params()).unwrap();
        container.data.truncate(8);

        assert!(matches!(
            container.open(b"password", 100),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_malformed_record_is_format_error() {
        for bad in [
            &b"not json at all"[..],
            br#"{"salt": "AAAA"}"#,
            br#"{"salt": "!!!", "data": "AAAA"}"#,
            br#"{"salt": 1, "data": "AAAA"}"#,
        ] {
            assert!(
                matches!(decrypt(b"password", bad, 100), Err(Error::Format(_))),
                "expected format error for {:?}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn test_serialized_form_is_base64url_json() {
        let bytes = encrypt(b"password", b"payload", &params()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let salt = value["salt"].as_str().unwrap();
        let data = value["data"].as_str().unwrap();
        assert!(!salt.contains('+') && !salt.contains('/'));
        assert!(!data.contains('+') && !data.contains('/'));
    }

    #[test]
    fn test_file_helpers() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed");
        let restored = dir.path().join("restored.txt");
        fs::write(&plain, b"file contents").unwrap();

        encrypt_file(&plain, &sealed, b"password", &params()).unwrap();
        assert!(verify_file(&sealed, b"password", 100).unwrap());
        assert!(!verify_file(&sealed, b"other", 100).unwrap());

        decrypt_file(&sealed, &restored, b"password", 100).unwrap();
        assert_eq!(fs::read(&restored).unwrap(), b"file contents");
    }
}
