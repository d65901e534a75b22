//! Per-user key slots.

use crate::bytes::ByteReader;
use crate::error::{Result, VaultError};

use super::types::{KekAlgorithm, MigrationStatus, UserRole, UsernameHashAlgorithm};

/// Serialized size of a slot with an empty username.
pub const KEYSLOT_MIN_SIZE: usize = 131;

/// Longest username (or username hash) a slot can hold.
pub const MAX_USERNAME_LEN: usize = 255;

pub const USERNAME_SALT_SIZE: usize = 16;
pub const KEK_SALT_SIZE: usize = 32;

/// A 32-byte key wrapped with an 8-byte integrity block.
pub const WRAPPED_KEY_SIZE: usize = 40;

const RESERVED_SIZE: usize = 3;

/// One user's credentials metadata and wrapped copy of the vault DEK.
///
/// `username` holds either the plaintext username or its hash, depending on
/// `username_hash_algorithm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlot {
    pub active: bool,
    pub kek_algorithm: KekAlgorithm,
    pub username_hash_algorithm: UsernameHashAlgorithm,
    pub username: Vec<u8>,
    pub username_salt: [u8; USERNAME_SALT_SIZE],
    pub salt: [u8; KEK_SALT_SIZE],
    pub wrapped_dek: [u8; WRAPPED_KEY_SIZE],
    pub role: UserRole,
    pub must_change_password: bool,
    pub password_changed_at: u64,
    pub last_login_at: u64,
    pub migration_status: MigrationStatus,
    pub migrated_at: u64,
    pub second_factor_enrolled: bool,
    pub second_factor_enrolled_at: u64,
}

impl KeySlot {
    /// Bytes [`serialize`](Self::serialize) will produce.
    pub fn serialized_size(&self) -> usize {
        KEYSLOT_MIN_SIZE + self.username.len()
    }

    /// Serialize the slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the stored username exceeds 255 bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.username.len() > MAX_USERNAME_LEN {
            return Err(VaultError::InvalidData(format!(
                "username field is {} bytes (max {})",
                self.username.len(),
                MAX_USERNAME_LEN
            )));
        }

        let mut out = Vec::with_capacity(self.serialized_size());
        out.push(u8::from(self.active));
        out.push(self.kek_algorithm.to_byte());
        out.push(self.username_hash_algorithm.to_byte());
        out.push(self.username.len() as u8);
        out.extend_from_slice(&self.username);
        out.extend_from_slice(&self.username_salt);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.wrapped_dek);
        out.push(self.role.to_byte());
        out.push(u8::from(self.must_change_password));
        out.extend_from_slice(&self.password_changed_at.to_be_bytes());
        out.extend_from_slice(&self.last_login_at.to_be_bytes());
        out.push(self.migration_status.to_byte());
        out.extend_from_slice(&self.migrated_at.to_be_bytes());
        out.push(u8::from(self.second_factor_enrolled));
        out.extend_from_slice(&self.second_factor_enrolled_at.to_be_bytes());
        out.extend_from_slice(&[0u8; RESERVED_SIZE]);
        Ok(out)
    }

    /// Deserialize a slot at `offset`, returning it with the bytes consumed.
    pub fn deserialize(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut reader = ByteReader::at(bytes, offset)?;
        let slot = Self::read_from(&mut reader)?;
        Ok((slot, reader.offset() - offset))
    }

    pub(crate) fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let active = reader.bool()?;
        let kek_algorithm = KekAlgorithm::from_byte(reader.u8()?)?;
        let username_hash_algorithm = UsernameHashAlgorithm::from_byte(reader.u8()?)?;
        let username_len = reader.u8()? as usize;
        let username = reader.take(username_len)?.to_vec();

        let slot = Self {
            active,
            kek_algorithm,
            username_hash_algorithm,
            username,
            username_salt: reader.array()?,
            salt: reader.array()?,
            wrapped_dek: reader.array()?,
            role: UserRole::from_byte(reader.u8()?)?,
            must_change_password: reader.bool()?,
            password_changed_at: reader.u64_be()?,
            last_login_at: reader.u64_be()?,
            migration_status: MigrationStatus::from_byte(reader.u8()?)?,
            migrated_at: reader.u64_be()?,
            second_factor_enrolled: reader.bool()?,
            second_factor_enrolled_at: reader.u64_be()?,
        };
        reader.take(RESERVED_SIZE)?;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_slot(username_len: usize) -> KeySlot {
        KeySlot {
            active: true,
            kek_algorithm: KekAlgorithm::Pbkdf2Sha256,
            username_hash_algorithm: UsernameHashAlgorithm::Plaintext,
            username: vec![b'u'; username_len],
            username_salt: [0x11; USERNAME_SALT_SIZE],
            salt: [0x22; KEK_SALT_SIZE],
            wrapped_dek: [0x33; WRAPPED_KEY_SIZE],
            role: UserRole::Administrator,
            must_change_password: true,
            password_changed_at: 1_700_000_001,
            last_login_at: 1_700_000_002,
            migration_status: MigrationStatus::Pending,
            migrated_at: 0,
            second_factor_enrolled: true,
            second_factor_enrolled_at: 1_700_000_003,
        }
    }

    #[test]
    fn test_minimum_size() {
        let slot = sample_slot(0);
        assert_eq!(slot.serialize().unwrap().len(), KEYSLOT_MIN_SIZE);
    }

    #[test]
    fn test_round_trip_username_lengths() {
        for len in [0usize, 1, 255] {
            let slot = sample_slot(len);
            let bytes = slot.serialize().unwrap();
            assert_eq!(bytes.len(), slot.serialized_size());

            let (decoded, consumed) = KeySlot::deserialize(&bytes, 0).unwrap();
            assert_eq!(decoded, slot);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_deserialize_at_offset() {
        let slot = sample_slot(5);
        let mut bytes = vec![0xEE; 7];
        bytes.extend(slot.serialize().unwrap());
        bytes.push(0xEE);

        let (decoded, consumed) = KeySlot::deserialize(&bytes, 7).unwrap();
        assert_eq!(decoded, slot);
        assert_eq!(consumed, KEYSLOT_MIN_SIZE + 5);
    }

    #[test]
    fn test_oversized_username_rejected() {
        let slot = sample_slot(256);
        assert!(matches!(slot.serialize(), Err(VaultError::InvalidData(_))));
    }

    #[test]
    fn test_length_field_beyond_buffer_is_truncated() {
        let bytes = sample_slot(10).serialize().unwrap();
        // Every proper prefix must fail without reading past the buffer
        for cut in 0..bytes.len() {
            let result = KeySlot::deserialize(&bytes[..cut], 0);
            assert!(result.is_err(), "prefix of {} bytes accepted", cut);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let mut bytes = sample_slot(0).serialize().unwrap();
        // role follows active, algorithms, length, salts and wrapped key
        bytes[4 + USERNAME_SALT_SIZE + KEK_SALT_SIZE + WRAPPED_KEY_SIZE] = 9;
        assert!(matches!(
            KeySlot::deserialize(&bytes, 0),
            Err(VaultError::InvalidData(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_slot_round_trip(username in proptest::collection::vec(any::<u8>(), 0..=255),
                                salt in any::<[u8; 32]>(),
                                changed in any::<u64>(),
                                admin in any::<bool>()) {
            let mut slot = sample_slot(0);
            slot.username = username;
            slot.salt = salt;
            slot.password_changed_at = changed;
            slot.role = if admin { UserRole::Administrator } else { UserRole::Standard };

            let bytes = slot.serialize().unwrap();
            let (decoded, consumed) = KeySlot::deserialize(&bytes, 0).unwrap();
            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(decoded, slot);
        }
    }
}
