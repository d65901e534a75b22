//! Username hashing.
//!
//! Slots store `H(username || salt)` under the algorithm recorded in the
//! slot, so the vault file does not reveal who its users are. Plaintext
//! storage is kept for older vaults.

use argon2::Argon2;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use sha3::{Digest, Sha3_256, Sha3_384, Sha3_512};
use subtle::ConstantTimeEq;

use crate::error::{Result, VaultError};
use crate::keyslot::{
    UsernameHashAlgorithm, VaultSecurityPolicy, MAX_USERNAME_LEN, MIN_KDF_ITERATIONS,
    USERNAME_SALT_SIZE,
};

fn sha3_digest<D: Digest>(username: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(username.as_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}

/// Compute the stored form of `username` for a slot.
///
/// # Arguments
///
/// * `username` - The username as typed
/// * `algorithm` - The algorithm to hash with
/// * `salt` - The slot's username salt
/// * `policy` - Supplies PBKDF2 iterations and Argon2 parameters
///
/// # Errors
///
/// Returns `InvalidUsername` for an empty username or a plaintext name
/// over 255 bytes, and `Crypto` if a KDF rejects its parameters.
pub fn hash_username(
    username: &str,
    algorithm: UsernameHashAlgorithm,
    salt: &[u8; USERNAME_SALT_SIZE],
    policy: &VaultSecurityPolicy,
) -> Result<Vec<u8>> {
    if username.is_empty() {
        return Err(VaultError::InvalidUsername(
            "Username cannot be empty".to_string(),
        ));
    }

    match algorithm {
        UsernameHashAlgorithm::Plaintext => {
            if username.len() > MAX_USERNAME_LEN {
                return Err(VaultError::InvalidUsername(format!(
                    "Username exceeds {} bytes",
                    MAX_USERNAME_LEN
                )));
            }
            Ok(username.as_bytes().to_vec())
        }
        UsernameHashAlgorithm::Sha3_256 => Ok(sha3_digest::<Sha3_256>(username, salt)),
        UsernameHashAlgorithm::Sha3_384 => Ok(sha3_digest::<Sha3_384>(username, salt)),
        UsernameHashAlgorithm::Sha3_512 => Ok(sha3_digest::<Sha3_512>(username, salt)),
        UsernameHashAlgorithm::Pbkdf2Sha256 => {
            let iterations = policy.kdf_iterations.max(MIN_KDF_ITERATIONS);
            let mut out = vec![0u8; 32];
            pbkdf2_hmac::<Sha256>(username.as_bytes(), salt, iterations, &mut out);
            Ok(out)
        }
        UsernameHashAlgorithm::Argon2id => {
            let params = argon2::Params::new(
                policy.argon2_memory_kib,
                policy.argon2_iterations,
                u32::from(policy.argon2_parallelism),
                Some(32),
            )
            .map_err(|e| VaultError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

            let mut out = vec![0u8; 32];
            argon2
                .hash_password_into(username.as_bytes(), salt, &mut out)
                .map_err(|e| VaultError::Crypto(format!("Username hashing failed: {}", e)))?;
            Ok(out)
        }
    }
}

/// Check `username` against a slot's stored username in constant time.
///
/// Hashing failures count as a mismatch.
pub fn verify_username(
    username: &str,
    stored: &[u8],
    algorithm: UsernameHashAlgorithm,
    salt: &[u8; USERNAME_SALT_SIZE],
    policy: &VaultSecurityPolicy,
) -> bool {
    match hash_username(username, algorithm, salt, policy) {
        Ok(computed) => computed.as_slice().ct_eq(stored).into(),
        Err(_) => false,
    }
}
