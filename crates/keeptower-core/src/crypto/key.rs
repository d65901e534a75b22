//! Key material types.
//!
//! Both key types zeroize on drop and redact themselves in `Debug` output.
//! The data key additionally lives in its own heap allocation that is
//! pinned with `mlock` where the platform allows it.

use std::fmt;

use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// Length of every symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Fill a fixed-size array from the operating system RNG.
///
/// # Errors
///
/// Returns `Crypto` if the RNG is unavailable.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| VaultError::Crypto(format!("Random number generator failed: {}", e)))?;
    Ok(buf)
}

/// The vault data encryption key.
///
/// Never persisted unwrapped. The allocation is locked into RAM on a
/// best-effort basis; failure to lock is logged and otherwise ignored.
pub struct DataKey {
    key: Box<[u8; KEY_SIZE]>,
    locked: bool,
}

impl DataKey {
    /// Take ownership of raw key bytes.
    ///
    /// # Security
    ///
    /// The caller should drop or zeroize its own copy of `bytes`.
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        let key = Box::new(bytes);
        let locked = lock_memory(key.as_ptr(), KEY_SIZE);
        Self { key, locked }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate encryption operations.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Whether the key allocation is pinned in memory.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        (*self.key).zeroize();
        if self.locked {
            unlock_memory(self.key.as_ptr(), KEY_SIZE);
        }
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("key", &"[REDACTED]")
            .field("locked", &self.locked)
            .finish()
    }
}

/// Generate a fresh random data key.
///
/// # Errors
///
/// Returns `Crypto` if the RNG is unavailable.
pub fn generate_data_key() -> Result<DataKey> {
    let mut bytes = random_bytes::<KEY_SIZE>()?;
    let key = DataKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// A key-encryption key derived from a password (and optional second factor).
///
/// Exists only for the duration of an authentication or re-wrap.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyEncryptionKey {
    key: [u8; KEY_SIZE],
}

impl KeyEncryptionKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEncryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(unix)]
fn lock_memory(ptr: *const u8, len: usize) -> bool {
    // SAFETY: ptr/len describe a live allocation owned by the caller.
    let rc = unsafe { libc::mlock(ptr.cast::<libc::c_void>(), len) };
    if rc != 0 {
        warn!("mlock failed; key material may be swapped to disk");
        return false;
    }
    true
}

#[cfg(unix)]
fn unlock_memory(ptr: *const u8, len: usize) {
    // SAFETY: the region was locked by lock_memory and is still allocated.
    unsafe {
        libc::munlock(ptr.cast::<libc::c_void>(), len);
    }
}

#[cfg(not(unix))]
fn lock_memory(_ptr: *const u8, _len: usize) -> bool {
    false
}

#[cfg(not(unix))]
fn unlock_memory(_ptr: *const u8, _len: usize) {}
