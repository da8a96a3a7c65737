//! API key encryption at rest
//!
//! Keys are sealed with AES-256-GCM under a key derived from the server secret
//! (SHA-256 of `security.secret_key`). The stored form is base64url of
//! `nonce || ciphertext`, with a fresh 96-bit nonce per
//! encryption, so encrypting the same key twice yields different strings.
//!
//! Rotating the server secret makes previously stored keys undecryptable.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use data_encoding::BASE64URL;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Error types for secret encryption and decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Invalid encryption key")]
    InvalidKey,

    #[error("Encryption failed")]
    EncryptionFailed,

    /// Not base64url, or too short to hold a nonce
    #[error("Malformed ciphertext")]
    Malformed,

    /// Authentication failed: wrong server secret or tampered data
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Symmetric codec for per-user API keys
#[derive(Clone)]
pub struct SecretCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    /// Build a codec from the server secret
    pub fn new(server_secret: &str) -> Result<Self, SecretError> {
        let key = Sha256::digest(server_secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| SecretError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext secret into its storable form
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecretError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(BASE64URL.encode(&sealed))
    }

    /// Decrypt a value produced by [`SecretCodec::encrypt`]
    pub fn decrypt(&self, stored: &str) -> Result<String, SecretError> {
        let sealed = BASE64URL
            .decode(stored.trim().as_bytes())
            .map_err(|_| SecretError::Malformed)?;

        if sealed.len() <= NONCE_LEN {
            return Err(SecretError::Malformed);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| SecretError::InvalidUtf8)
    }
}
