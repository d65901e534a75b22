//! Authenticated encryption of the serialized record store.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

use super::key::{random_bytes, KEY_SIZE};

/// AES-GCM nonce length.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length, appended to the ciphertext.
pub const TAG_SIZE: usize = 16;

/// Ciphertext (tag appended) with the nonce it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Encrypt with AES-256-GCM under a fresh random nonce.
pub fn encrypt_payload(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<EncryptedPayload> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Crypto(format!("Invalid key length: {}", e)))?;
    let nonce = random_bytes::<NONCE_SIZE>()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::Crypto("Payload encryption failed".to_string()))?;
    Ok(EncryptedPayload { nonce, ciphertext })
}

/// Decrypt and authenticate a payload.
///
/// # Errors
///
/// Returns `AuthenticationFailed` on a tag mismatch or a ciphertext too
/// short to hold a tag.
pub fn decrypt_payload(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(VaultError::AuthenticationFailed);
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Crypto(format!("Invalid key length: {}", e)))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::AuthenticationFailed)?;
    Ok(Zeroizing::new(plaintext))
}
