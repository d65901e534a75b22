//! Error types for KeepTower core operations.
//!
//! Errors are grouped the way callers need to react to them: file errors,
//! format errors, authentication errors, FEC errors and policy errors.
//! Cryptographic failures during unwrap or decryption are always reported
//! as [`VaultError::AuthenticationFailed`] so that a caller cannot tell a
//! wrong password from an unknown username. FEC failures are kept distinct
//! so that "wrong password" and "corrupted file" stay distinguishable.

use std::io;

use thiserror::Error;

/// Result type alias for KeepTower operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for KeepTower operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault file (or a backup) does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The operating system refused access
    #[error("Permission denied: {0}")]
    FilePermissionDenied(String),

    /// Reading from disk failed
    #[error("File read failed: {0}")]
    FileReadFailed(String),

    /// Writing, syncing or renaming failed
    #[error("File write failed: {0}")]
    FileWriteFailed(String),

    #[error("A vault is already open")]
    VaultAlreadyOpen,

    #[error("No vault is open")]
    VaultNotOpen,

    #[error("Vault state lock poisoned")]
    LockPoisoned,

    /// The session must change its password before touching records
    #[error("Password change required before accessing the vault")]
    PasswordChangeRequired,

    /// Caller supplied data that cannot be processed
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A buffer ended before a complete structure could be read
    #[error("Truncated data: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The file structure is damaged or inconsistent
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("Unsupported vault version: {0}")]
    UnsupportedVersion(u32),

    /// Wrong username, wrong password, or a failed integrity check
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Internal failure of a cryptographic primitive (never an auth result)
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("FEC encoding failed: {0}")]
    FecEncodingFailed(String),

    /// A single FEC block exceeded its correction capacity
    #[error("FEC decoding failed: {0}")]
    DecodingFailed(String),

    /// A FEC-protected vault section could not be recovered
    #[error("FEC recovery failed: {0}")]
    FecDecodingFailed(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Users cannot remove themselves")]
    SelfRemovalNotAllowed,

    #[error("Cannot remove the last administrator")]
    LastAdministrator,

    #[error("Maximum number of users reached ({0})")]
    MaxUsersReached(usize),

    #[error("Invalid security policy: {0}")]
    InvalidPolicy(String),

    /// Attempt to weaken a requirement that cannot be weakened
    #[error("Security policy downgrade rejected: {0}")]
    PolicyDowngrade(String),

    /// The second factor device is required but absent
    #[error("Second factor not present")]
    SecondFactorUnavailable,

    #[error("Second factor failed: {0}")]
    SecondFactorFailed(String),

    /// Record store (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),
}

impl VaultError {
    /// Whether this error indicates on-disk damage rather than bad credentials.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            VaultError::CorruptedFile(_)
                | VaultError::DecodingFailed(_)
                | VaultError::FecDecodingFailed(_)
                | VaultError::Truncated { .. }
        )
    }
}

impl From<io::Error> for VaultError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => VaultError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => VaultError::FilePermissionDenied(err.to_string()),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
                VaultError::FileReadFailed(err.to_string())
            }
            _ => VaultError::FileWriteFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
