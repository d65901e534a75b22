//! Vault-wide security policy.

use crate::bytes::ByteReader;
use crate::error::{Result, VaultError};

use super::types::{KekAlgorithm, SecondFactorAlgorithm, UsernameHashAlgorithm};

/// Serialized size of [`VaultSecurityPolicy`].
pub const POLICY_SERIALIZED_SIZE: usize = 117;

/// Length of the shared second-factor challenge.
pub const CHALLENGE_SIZE: usize = 64;

/// Accepted range for `min_password_length`.
pub const MIN_PASSWORD_LENGTH_RANGE: std::ops::RangeInclusive<u32> = 8..=128;

/// Lowest accepted PBKDF2 iteration count.
pub const MIN_KDF_ITERATIONS: u32 = 1000;

/// Highest accepted PBKDF2 iteration count.
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;

/// Production PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Highest accepted Argon2 memory cost (4 GiB).
pub const MAX_ARGON2_MEMORY_KIB: u32 = 4 * 1024 * 1024;

/// Highest accepted Argon2 pass count.
pub const MAX_ARGON2_ITERATIONS: u32 = 64;

/// Bit 0 of `migration_flags`: a username-hash migration is in progress.
pub const MIGRATION_FLAG_ACTIVE: u8 = 0x01;

/// Flag bits that carry meaning; the rest are cleared on read.
const MIGRATION_FLAGS_KNOWN: u8 = 0x03;

const RESERVED_SIZE: usize = 22;

/// Uniform settings shared by every user of a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSecurityPolicy {
    pub require_second_factor: bool,
    pub second_factor_algorithm: SecondFactorAlgorithm,
    pub min_password_length: u32,
    /// PBKDF2 iterations for KEK derivation and PBKDF2 username hashing
    pub kdf_iterations: u32,
    /// Algorithm new slots (and migrated slots) use for usernames
    pub username_hash_algorithm: UsernameHashAlgorithm,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u8,
    pub second_factor_challenge: [u8; CHALLENGE_SIZE],
    /// Algorithm being migrated away from; meaningful only while migrating
    pub previous_username_hash_algorithm: UsernameHashAlgorithm,
    pub migration_started_at: u64,
    pub migration_flags: u8,
    /// KDF new slots use for their KEK
    pub kek_algorithm: KekAlgorithm,
}

impl Default for VaultSecurityPolicy {
    fn default() -> Self {
        Self {
            require_second_factor: false,
            second_factor_algorithm: SecondFactorAlgorithm::HmacSha256,
            min_password_length: 12,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            username_hash_algorithm: UsernameHashAlgorithm::Sha3_256,
            argon2_memory_kib: 64 * 1024,
            argon2_iterations: 3,
            argon2_parallelism: 1,
            second_factor_challenge: [0u8; CHALLENGE_SIZE],
            previous_username_hash_algorithm: UsernameHashAlgorithm::Sha3_256,
            migration_started_at: 0,
            migration_flags: 0,
            kek_algorithm: KekAlgorithm::Pbkdf2Sha256,
        }
    }
}

impl VaultSecurityPolicy {
    /// Whether logins should also try the previous username algorithm.
    pub fn migration_active(&self) -> bool {
        self.migration_flags & MIGRATION_FLAG_ACTIVE != 0
            && self.previous_username_hash_algorithm != self.username_hash_algorithm
    }

    /// Check ranges before the policy is used or persisted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !MIN_PASSWORD_LENGTH_RANGE.contains(&self.min_password_length) {
            return Err(VaultError::InvalidPolicy(format!(
                "minimum password length must be between {} and {} (got {})",
                MIN_PASSWORD_LENGTH_RANGE.start(),
                MIN_PASSWORD_LENGTH_RANGE.end(),
                self.min_password_length
            )));
        }
        if !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&self.kdf_iterations) {
            return Err(VaultError::InvalidPolicy(format!(
                "KDF iterations must be between {} and {} (got {})",
                MIN_KDF_ITERATIONS, MAX_KDF_ITERATIONS, self.kdf_iterations
            )));
        }
        if self.argon2_memory_kib > MAX_ARGON2_MEMORY_KIB {
            return Err(VaultError::InvalidPolicy(format!(
                "Argon2 memory must be at most {} KiB (got {})",
                MAX_ARGON2_MEMORY_KIB, self.argon2_memory_kib
            )));
        }
        if !(1..=MAX_ARGON2_ITERATIONS).contains(&self.argon2_iterations) {
            return Err(VaultError::InvalidPolicy(format!(
                "Argon2 iterations must be between 1 and {} (got {})",
                MAX_ARGON2_ITERATIONS, self.argon2_iterations
            )));
        }
        if self.argon2_parallelism == 0 {
            return Err(VaultError::InvalidPolicy(
                "Argon2 parallelism must be at least 1".to_string(),
            ));
        }
        argon2::Params::new(
            self.argon2_memory_kib,
            self.argon2_iterations,
            u32::from(self.argon2_parallelism),
            Some(32),
        )
        .map_err(|e| VaultError::InvalidPolicy(format!("Argon2 parameters rejected: {}", e)))?;
        Ok(())
    }

    /// Serialize to the fixed 117-byte layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(POLICY_SERIALIZED_SIZE);
        out.push(u8::from(self.require_second_factor));
        out.push(self.second_factor_algorithm.to_byte());
        out.extend_from_slice(&self.min_password_length.to_be_bytes());
        out.extend_from_slice(&self.kdf_iterations.to_be_bytes());
        out.push(self.username_hash_algorithm.to_byte());
        out.extend_from_slice(&self.argon2_memory_kib.to_be_bytes());
        out.extend_from_slice(&self.argon2_iterations.to_be_bytes());
        out.push(self.argon2_parallelism);
        out.extend_from_slice(&self.second_factor_challenge);
        out.push(self.previous_username_hash_algorithm.to_byte());
        out.extend_from_slice(&self.migration_started_at.to_be_bytes());
        out.push(self.migration_flags & MIGRATION_FLAGS_KNOWN);
        out.push(self.kek_algorithm.to_byte());
        out.extend_from_slice(&[0u8; RESERVED_SIZE]);
        out
    }

    /// Read a policy starting at the reader's position.
    ///
    /// Values [`validate`](Self::validate) would reject are reported as
    /// `CorruptedFile`.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let body = reader.take(POLICY_SERIALIZED_SIZE)?;
        let mut r = ByteReader::new(body);

        let policy = Self {
            require_second_factor: r.bool()?,
            second_factor_algorithm: SecondFactorAlgorithm::from_byte(r.u8()?)?,
            min_password_length: r.u32_be()?,
            kdf_iterations: r.u32_be()?,
            username_hash_algorithm: UsernameHashAlgorithm::from_byte(r.u8()?)?,
            argon2_memory_kib: r.u32_be()?,
            argon2_iterations: r.u32_be()?,
            argon2_parallelism: r.u8()?,
            second_factor_challenge: r.array()?,
            previous_username_hash_algorithm: UsernameHashAlgorithm::from_byte(r.u8()?)?,
            migration_started_at: r.u64_be()?,
            migration_flags: r.u8()? & MIGRATION_FLAGS_KNOWN,
            kek_algorithm: KekAlgorithm::from_byte(r.u8()?)?,
        };
        policy
            .validate()
            .map_err(|e| VaultError::CorruptedFile(format!("security policy out of range: {}", e)))?;
        Ok(policy)
    }

    /// Deserialize from the start of `bytes`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut ByteReader::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> VaultSecurityPolicy {
        let mut challenge = [0u8; CHALLENGE_SIZE];
        for (i, byte) in challenge.iter_mut().enumerate() {
            *byte = i as u8;
        }
        VaultSecurityPolicy {
            require_second_factor: true,
            second_factor_algorithm: SecondFactorAlgorithm::HmacSha1,
            min_password_length: 16,
            kdf_iterations: 250_000,
            username_hash_algorithm: UsernameHashAlgorithm::Pbkdf2Sha256,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            argon2_parallelism: 4,
            second_factor_challenge: challenge,
            previous_username_hash_algorithm: UsernameHashAlgorithm::Sha3_256,
            migration_started_at: 1_700_000_000,
            migration_flags: MIGRATION_FLAG_ACTIVE,
            kek_algorithm: KekAlgorithm::Argon2id,
        }
    }

    #[test]
    fn test_serialized_size_is_fixed() {
        assert_eq!(VaultSecurityPolicy::default().serialize().len(), POLICY_SERIALIZED_SIZE);
        assert_eq!(sample_policy().serialize().len(), POLICY_SERIALIZED_SIZE);
    }

    #[test]
    fn test_round_trip() {
        let policy = sample_policy();
        let bytes = policy.serialize();
        assert_eq!(VaultSecurityPolicy::deserialize(&bytes).unwrap(), policy);
    }

    #[test]
    fn test_field_offsets() {
        let bytes = sample_policy().serialize();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[2..6], &16u32.to_be_bytes());
        assert_eq!(&bytes[6..10], &250_000u32.to_be_bytes());
        assert_eq!(bytes[10], 0x04);
        assert_eq!(bytes[19], 4);
        assert_eq!(bytes[20], 0);
        assert_eq!(bytes[83], 63);
        assert_eq!(bytes[84], 0x01);
        assert_eq!(bytes[93], MIGRATION_FLAG_ACTIVE);
        assert!(bytes[95..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = sample_policy().serialize();
        let result = VaultSecurityPolicy::deserialize(&bytes[..POLICY_SERIALIZED_SIZE - 1]);
        assert!(matches!(result, Err(VaultError::Truncated { .. })));
    }

    #[test]
    fn test_reserved_migration_bits_cleared() {
        let mut bytes = sample_policy().serialize();
        bytes[93] = 0xFD;
        let policy = VaultSecurityPolicy::deserialize(&bytes).unwrap();
        assert_eq!(policy.migration_flags, 0x01);
    }

    #[test]
    fn test_migration_active_requires_distinct_algorithms() {
        let mut policy = sample_policy();
        assert!(policy.migration_active());
        policy.previous_username_hash_algorithm = policy.username_hash_algorithm;
        assert!(!policy.migration_active());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(VaultSecurityPolicy::default().validate().is_ok());

        let mut policy = VaultSecurityPolicy::default();
        policy.min_password_length = 7;
        assert!(matches!(policy.validate(), Err(VaultError::InvalidPolicy(_))));

        policy.min_password_length = 129;
        assert!(policy.validate().is_err());

        let mut policy = VaultSecurityPolicy::default();
        policy.kdf_iterations = 999;
        assert!(policy.validate().is_err());

        let mut policy = VaultSecurityPolicy::default();
        policy.kdf_iterations = MAX_KDF_ITERATIONS + 1;
        assert!(policy.validate().is_err());

        let mut policy = VaultSecurityPolicy::default();
        policy.argon2_memory_kib = MAX_ARGON2_MEMORY_KIB + 1;
        assert!(policy.validate().is_err());

        let mut policy = VaultSecurityPolicy::default();
        policy.argon2_iterations = 0;
        assert!(policy.validate().is_err());
        policy.argon2_iterations = MAX_ARGON2_ITERATIONS + 1;
        assert!(policy.validate().is_err());

        let mut policy = VaultSecurityPolicy::default();
        policy.argon2_parallelism = 0;
        assert!(policy.validate().is_err());

        let mut policy = VaultSecurityPolicy::default();
        policy.kdf_iterations = MAX_KDF_ITERATIONS;
        policy.argon2_memory_kib = MAX_ARGON2_MEMORY_KIB;
        policy.argon2_iterations = MAX_ARGON2_ITERATIONS;
        assert!(policy.validate().is_ok());
    }

    fn assert_rejected_on_read(offset: usize, value: &[u8]) {
        let mut bytes = sample_policy().serialize();
        bytes[offset..offset + value.len()].copy_from_slice(value);
        let result = VaultSecurityPolicy::deserialize(&bytes);
        assert!(
            matches!(result, Err(VaultError::CorruptedFile(_))),
            "offset {} value {:?}: {:?}",
            offset,
            value,
            result
        );
    }

    #[test]
    fn test_out_of_range_fields_rejected_on_read() {
        // min_password_length
        assert_rejected_on_read(2, &0u32.to_be_bytes());
        assert_rejected_on_read(2, &u32::MAX.to_be_bytes());
        // kdf_iterations
        assert_rejected_on_read(6, &0u32.to_be_bytes());
        assert_rejected_on_read(6, &u32::MAX.to_be_bytes());
        // argon2_memory_kib
        assert_rejected_on_read(11, &u32::MAX.to_be_bytes());
        assert_rejected_on_read(11, &0u32.to_be_bytes());
        // argon2_iterations
        assert_rejected_on_read(15, &0u32.to_be_bytes());
        assert_rejected_on_read(15, &u32::MAX.to_be_bytes());
        // argon2_parallelism
        assert_rejected_on_read(19, &[0]);
    }
}
