//! Small enumerations stored as single bytes in the vault header.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Seconds since the Unix epoch, as stored in slot timestamps.
pub fn unix_timestamp() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Permission level of a key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Standard,
    Administrator,
}

impl UserRole {
    pub fn to_byte(self) -> u8 {
        match self {
            UserRole::Standard => 0x00,
            UserRole::Administrator => 0x01,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(UserRole::Standard),
            0x01 => Ok(UserRole::Administrator),
            other => Err(VaultError::InvalidData(format!("unknown role 0x{:02x}", other))),
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Administrator)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Standard => write!(f, "standard"),
            UserRole::Administrator => write!(f, "administrator"),
        }
    }
}

impl FromStr for UserRole {
    type Err = VaultError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" | "user" => Ok(UserRole::Standard),
            "admin" | "administrator" => Ok(UserRole::Administrator),
            other => Err(VaultError::InvalidData(format!("unknown role: {}", other))),
        }
    }
}

/// Per-slot progress of a username-hash migration.
///
/// `NotMigrated -> Pending -> Migrated`, or straight to `Migrated`, and
/// only ever on a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    NotMigrated,
    Pending,
    Migrated,
}

impl MigrationStatus {
    pub fn to_byte(self) -> u8 {
        match self {
            MigrationStatus::NotMigrated => 0x00,
            MigrationStatus::Migrated => 0x01,
            MigrationStatus::Pending => 0xFF,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(MigrationStatus::NotMigrated),
            0x01 => Ok(MigrationStatus::Migrated),
            0xFF => Ok(MigrationStatus::Pending),
            other => Err(VaultError::InvalidData(format!(
                "unknown migration status 0x{:02x}",
                other
            ))),
        }
    }
}

/// How a slot's username is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsernameHashAlgorithm {
    Plaintext,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Pbkdf2Sha256,
    Argon2id,
}

impl UsernameHashAlgorithm {
    pub fn to_byte(self) -> u8 {
        match self {
            UsernameHashAlgorithm::Plaintext => 0x00,
            UsernameHashAlgorithm::Sha3_256 => 0x01,
            UsernameHashAlgorithm::Sha3_384 => 0x02,
            UsernameHashAlgorithm::Sha3_512 => 0x03,
            UsernameHashAlgorithm::Pbkdf2Sha256 => 0x04,
            UsernameHashAlgorithm::Argon2id => 0x05,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(UsernameHashAlgorithm::Plaintext),
            0x01 => Ok(UsernameHashAlgorithm::Sha3_256),
            0x02 => Ok(UsernameHashAlgorithm::Sha3_384),
            0x03 => Ok(UsernameHashAlgorithm::Sha3_512),
            0x04 => Ok(UsernameHashAlgorithm::Pbkdf2Sha256),
            0x05 => Ok(UsernameHashAlgorithm::Argon2id),
            other => Err(VaultError::InvalidData(format!(
                "unknown username hash algorithm 0x{:02x}",
                other
            ))),
        }
    }

    /// Digest length in bytes, `None` for plaintext.
    pub fn output_len(self) -> Option<usize> {
        match self {
            UsernameHashAlgorithm::Plaintext => None,
            UsernameHashAlgorithm::Sha3_256 => Some(32),
            UsernameHashAlgorithm::Sha3_384 => Some(48),
            UsernameHashAlgorithm::Sha3_512 => Some(64),
            UsernameHashAlgorithm::Pbkdf2Sha256 | UsernameHashAlgorithm::Argon2id => Some(32),
        }
    }
}

impl fmt::Display for UsernameHashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UsernameHashAlgorithm::Plaintext => "plaintext",
            UsernameHashAlgorithm::Sha3_256 => "sha3-256",
            UsernameHashAlgorithm::Sha3_384 => "sha3-384",
            UsernameHashAlgorithm::Sha3_512 => "sha3-512",
            UsernameHashAlgorithm::Pbkdf2Sha256 => "pbkdf2-sha256",
            UsernameHashAlgorithm::Argon2id => "argon2id",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for UsernameHashAlgorithm {
    type Err = VaultError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plaintext" | "plain" => Ok(UsernameHashAlgorithm::Plaintext),
            "sha3-256" => Ok(UsernameHashAlgorithm::Sha3_256),
            "sha3-384" => Ok(UsernameHashAlgorithm::Sha3_384),
            "sha3-512" => Ok(UsernameHashAlgorithm::Sha3_512),
            "pbkdf2-sha256" | "pbkdf2" => Ok(UsernameHashAlgorithm::Pbkdf2Sha256),
            "argon2id" | "argon2" => Ok(UsernameHashAlgorithm::Argon2id),
            other => Err(VaultError::InvalidData(format!(
                "unknown username hash algorithm: {}",
                other
            ))),
        }
    }
}

/// Password-based KDF used to derive a slot's KEK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KekAlgorithm {
    Pbkdf2Sha256,
    Argon2id,
}

impl KekAlgorithm {
    pub fn to_byte(self) -> u8 {
        match self {
            KekAlgorithm::Pbkdf2Sha256 => 0x04,
            KekAlgorithm::Argon2id => 0x05,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x04 => Ok(KekAlgorithm::Pbkdf2Sha256),
            0x05 => Ok(KekAlgorithm::Argon2id),
            other => Err(VaultError::InvalidData(format!(
                "unknown KEK algorithm 0x{:02x}",
                other
            ))),
        }
    }
}

impl fmt::Display for KekAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KekAlgorithm::Pbkdf2Sha256 => write!(f, "pbkdf2-sha256"),
            KekAlgorithm::Argon2id => write!(f, "argon2id"),
        }
    }
}

impl FromStr for KekAlgorithm {
    type Err = VaultError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pbkdf2-sha256" | "pbkdf2" => Ok(KekAlgorithm::Pbkdf2Sha256),
            "argon2id" | "argon2" => Ok(KekAlgorithm::Argon2id),
            other => Err(VaultError::InvalidData(format!("unknown KEK algorithm: {}", other))),
        }
    }
}

/// Challenge-response algorithm the second-factor device is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondFactorAlgorithm {
    HmacSha1,
    HmacSha256,
    HmacSha512,
}

impl SecondFactorAlgorithm {
    pub fn to_byte(self) -> u8 {
        match self {
            SecondFactorAlgorithm::HmacSha1 => 0x01,
            SecondFactorAlgorithm::HmacSha256 => 0x02,
            SecondFactorAlgorithm::HmacSha512 => 0x03,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(SecondFactorAlgorithm::HmacSha1),
            0x02 => Ok(SecondFactorAlgorithm::HmacSha256),
            0x03 => Ok(SecondFactorAlgorithm::HmacSha512),
            other => Err(VaultError::InvalidData(format!(
                "unknown second factor algorithm 0x{:02x}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_values_are_stable() {
        assert_eq!(MigrationStatus::NotMigrated.to_byte(), 0x00);
        assert_eq!(MigrationStatus::Migrated.to_byte(), 0x01);
        assert_eq!(MigrationStatus::Pending.to_byte(), 0xFF);
        assert_eq!(UsernameHashAlgorithm::Argon2id.to_byte(), 0x05);
        assert_eq!(KekAlgorithm::Pbkdf2Sha256.to_byte(), 0x04);
        assert_eq!(UserRole::Administrator.to_byte(), 0x01);
    }

    #[test]
    fn test_from_byte_round_trip() {
        for byte in 0u8..=5 {
            let algorithm = UsernameHashAlgorithm::from_byte(byte).unwrap();
            assert_eq!(algorithm.to_byte(), byte);
        }
        assert!(UsernameHashAlgorithm::from_byte(6).is_err());
        assert!(KekAlgorithm::from_byte(0x01).is_err());
        assert!(UserRole::from_byte(2).is_err());
        assert!(MigrationStatus::from_byte(0x02).is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "SHA3-512".parse::<UsernameHashAlgorithm>().unwrap(),
            UsernameHashAlgorithm::Sha3_512
        );
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Administrator);
        assert_eq!("argon2id".parse::<KekAlgorithm>().unwrap(), KekAlgorithm::Argon2id);
        assert!("md5".parse::<UsernameHashAlgorithm>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let algorithm = UsernameHashAlgorithm::Pbkdf2Sha256;
        assert_eq!(algorithm.to_string().parse::<UsernameHashAlgorithm>().unwrap(), algorithm);
    }
}
