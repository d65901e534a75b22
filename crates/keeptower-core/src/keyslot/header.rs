//! The V2 vault header: security policy plus key slots.

use crate::bytes::ByteReader;
use crate::error::{Result, VaultError};

use super::policy::{VaultSecurityPolicy, POLICY_SERIALIZED_SIZE};
use super::slot::KeySlot;

/// Key slots per vault (LUKS2 parity).
pub const MAX_KEY_SLOTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultHeaderV2 {
    pub security_policy: VaultSecurityPolicy,
    pub key_slots: Vec<KeySlot>,
}

impl VaultHeaderV2 {
    pub fn new(security_policy: VaultSecurityPolicy) -> Self {
        Self {
            security_policy,
            key_slots: Vec::new(),
        }
    }

    pub fn calculate_serialized_size(&self) -> usize {
        POLICY_SERIALIZED_SIZE
            + 1
            + self
                .key_slots
                .iter()
                .map(KeySlot::serialized_size)
                .sum::<usize>()
    }

    /// Serialize policy, slot count and slots.
    ///
    /// # Errors
    ///
    /// Returns `MaxUsersReached` above 32 slots and `InvalidData` if a slot
    /// cannot be serialized.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.key_slots.len() > MAX_KEY_SLOTS {
            return Err(VaultError::MaxUsersReached(MAX_KEY_SLOTS));
        }
        let mut out = Vec::with_capacity(self.calculate_serialized_size());
        out.extend_from_slice(&self.security_policy.serialize());
        out.push(self.key_slots.len() as u8);
        for slot in &self.key_slots {
            out.extend_from_slice(&slot.serialize()?);
        }
        Ok(out)
    }

    /// Deserialize a header, returning it with the bytes consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut reader = ByteReader::new(bytes);
        let security_policy = VaultSecurityPolicy::read_from(&mut reader)?;

        let count = reader.u8()? as usize;
        if count > MAX_KEY_SLOTS {
            return Err(VaultError::InvalidData(format!(
                "header declares {} key slots (max {})",
                count, MAX_KEY_SLOTS
            )));
        }

        let mut key_slots = Vec::with_capacity(count);
        for _ in 0..count {
            key_slots.push(KeySlot::read_from(&mut reader)?);
        }

        Ok((
            Self {
                security_policy,
                key_slots,
            },
            reader.offset(),
        ))
    }

    pub fn active_slots(&self) -> impl Iterator<Item = &KeySlot> {
        self.key_slots.iter().filter(|slot| slot.active)
    }

    pub fn active_admin_count(&self) -> usize {
        self.active_slots().filter(|slot| slot.role.is_admin()).count()
    }
}
