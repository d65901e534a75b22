//! DEK wrapping and second-factor key combination.

use aes_kw::KekAes256;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::keyslot::WRAPPED_KEY_SIZE;

use super::key::{DataKey, KeyEncryptionKey, KEY_SIZE};

/// Wrap the DEK under a KEK with AES-256 key wrap (RFC 3394).
///
/// The output carries an 8-byte integrity block, so unwrapping with any
/// other KEK fails instead of producing a wrong key.
pub fn wrap_key(kek: &KeyEncryptionKey, dek: &DataKey) -> Result<[u8; WRAPPED_KEY_SIZE]> {
    let cipher = KekAes256::from(*kek.as_bytes());
    let mut wrapped = [0u8; WRAPPED_KEY_SIZE];
    cipher
        .wrap(dek.as_bytes(), &mut wrapped)
        .map_err(|e| VaultError::Crypto(format!("Key wrap failed: {}", e)))?;
    Ok(wrapped)
}

/// Unwrap a DEK.
///
/// # Errors
///
/// Returns `AuthenticationFailed` when the integrity check fails, which is
/// how a wrong password is detected.
pub fn unwrap_key(kek: &KeyEncryptionKey, wrapped: &[u8; WRAPPED_KEY_SIZE]) -> Result<DataKey> {
    let cipher = KekAes256::from(*kek.as_bytes());
    let mut dek = Zeroizing::new([0u8; KEY_SIZE]);
    cipher
        .unwrap(wrapped, dek.as_mut_slice())
        .map_err(|_| VaultError::AuthenticationFailed)?;
    Ok(DataKey::from_bytes(*dek))
}

/// Combine a KEK with a second-factor response.
///
/// Responses up to 32 bytes are zero-extended, longer ones are reduced
/// with SHA-256; the result is XORed into the KEK.
///
/// # Errors
///
/// Returns `SecondFactorFailed` for an empty response.
pub fn combine_with_second_factor(
    kek: &KeyEncryptionKey,
    response: &[u8],
) -> Result<KeyEncryptionKey> {
    if response.is_empty() {
        return Err(VaultError::SecondFactorFailed(
            "empty challenge response".to_string(),
        ));
    }

    let mut mask = Zeroizing::new([0u8; KEY_SIZE]);
    if response.len() <= KEY_SIZE {
        mask[..response.len()].copy_from_slice(response);
    } else {
        mask.copy_from_slice(&Sha256::digest(response));
    }

    let mut combined = [0u8; KEY_SIZE];
    for (out, (k, m)) in combined
        .iter_mut()
        .zip(kek.as_bytes().iter().zip(mask.iter()))
    {
        *out = k ^ m;
    }
    Ok(KeyEncryptionKey::from_bytes(combined))
}
