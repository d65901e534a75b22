//! Password-based key derivation.
//!
//! Two KDFs are supported per slot: PBKDF2-HMAC-SHA256 (the default, and
//! the only one V1 files use) and Argon2id. Both are deterministic: the
//! same password, salt and parameters always yield the same KEK.

use argon2::Argon2;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::keyslot::{KekAlgorithm, VaultSecurityPolicy, MIN_KDF_ITERATIONS};

use super::key::{KeyEncryptionKey, KEY_SIZE};

const MIN_SALT_LENGTH: usize = 16;

fn check_inputs(password: &str, salt: &[u8]) -> Result<()> {
    if password.is_empty() {
        return Err(VaultError::InvalidData(
            "Password cannot be empty".to_string(),
        ));
    }
    if salt.len() < MIN_SALT_LENGTH {
        return Err(VaultError::InvalidData(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }
    Ok(())
}

/// Derive a KEK with PBKDF2-HMAC-SHA256.
///
/// # Arguments
///
/// * `password` - The user's password
/// * `salt` - The slot's random salt (32 bytes in V2 slots)
/// * `iterations` - Iteration count, at least 1000
///
/// # Errors
///
/// Returns `InvalidData` for an empty password, a short salt, or an
/// iteration count below the minimum.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Result<KeyEncryptionKey> {
    check_inputs(password, salt)?;
    if iterations < MIN_KDF_ITERATIONS {
        return Err(VaultError::InvalidData(format!(
            "KDF iterations must be at least {} (got {})",
            MIN_KDF_ITERATIONS, iterations
        )));
    }

    let mut key_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key_bytes[..]);
    Ok(KeyEncryptionKey::from_bytes(*key_bytes))
}

/// Derive a KEK with Argon2id.
///
/// # Security
///
/// Memory-hard: requires `memory_kib` KiB of RAM per derivation.
pub fn derive_key_argon2(
    password: &str,
    salt: &[u8],
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<KeyEncryptionKey> {
    check_inputs(password, salt)?;

    let params = argon2::Params::new(memory_kib, iterations, parallelism, Some(KEY_SIZE))
        .map_err(|e| VaultError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key_bytes[..])
        .map_err(|e| VaultError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(KeyEncryptionKey::from_bytes(*key_bytes))
}

/// Derive a slot's KEK with the algorithm the slot records.
pub fn derive_kek(
    password: &str,
    salt: &[u8],
    algorithm: KekAlgorithm,
    policy: &VaultSecurityPolicy,
) -> Result<KeyEncryptionKey> {
    match algorithm {
        KekAlgorithm::Pbkdf2Sha256 => derive_key(password, salt, policy.kdf_iterations),
        KekAlgorithm::Argon2id => derive_key_argon2(
            password,
            salt,
            policy.argon2_memory_kib,
            policy.argon2_iterations,
            u32::from(policy.argon2_parallelism),
        ),
    }
}
