//! Plaintext record store carried in the encrypted payload.
//!
//! Serialized as JSON. Unknown fields are ignored and missing fields take
//! their defaults, so older and newer builds can read each other's vaults.
//! Business rules for accounts and groups live outside the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Current record store schema.
pub const SCHEMA_VERSION: u32 = 1;

/// A stored credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountRecord {
    pub id: Uuid,
    pub account_name: String,
    pub user_name: String,
    pub password: String,
    pub email: String,
    pub website: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub group_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Default for AccountRecord {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            account_name: String::new(),
            user_name: String::new(),
            password: String::new(),
            email: String::new(),
            website: String::new(),
            notes: String::new(),
            tags: Vec::new(),
            is_favorite: false,
            group_ids: Vec::new(),
            created_at: DateTime::<Utc>::default(),
            modified_at: DateTime::<Utc>::default(),
        }
    }
}

impl AccountRecord {
    /// A new record with a fresh id and timestamps.
    pub fn new(account_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_name: account_name.into(),
            created_at: now,
            modified_at: now,
            ..Self::default()
        }
    }
}

impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("id", &self.id)
            .field("account_name", &self.account_name)
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .field("website", &self.website)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// A named grouping of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountGroup {
    pub id: Uuid,
    pub group_name: String,
    pub display_order: u32,
    pub is_expanded: bool,
}

impl Default for AccountGroup {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            group_name: String::new(),
            display_order: 0,
            is_expanded: true,
        }
    }
}

/// The decrypted vault contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultData {
    pub schema_version: u32,
    pub accounts: Vec<AccountRecord>,
    pub groups: Vec<AccountGroup>,
    pub last_modified: DateTime<Utc>,
}

impl Default for VaultData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            accounts: Vec::new(),
            groups: Vec::new(),
            last_modified: Utc::now(),
        }
    }
}

impl VaultData {
    /// Serialize for encryption.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(serde_json::to_vec(self)?))
    }

    /// Parse decrypted payload bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn find(&self, id: &Uuid) -> Option<&AccountRecord> {
        self.accounts.iter().find(|record| record.id == *id)
    }

    /// Append a record, assigning an id if it has none.
    pub fn add(&mut self, mut record: AccountRecord) -> Uuid {
        if record.id.is_nil() {
            record.id = Uuid::new_v4();
        }
        let now = Utc::now();
        if record.created_at == DateTime::<Utc>::default() {
            record.created_at = now;
        }
        record.modified_at = now;
        let id = record.id;
        self.accounts.push(record);
        self.last_modified = now;
        id
    }

    /// Replace the record with the same id.
    pub fn update(&mut self, mut record: AccountRecord) -> Result<()> {
        let slot = self
            .accounts
            .iter_mut()
            .find(|existing| existing.id == record.id)
            .ok_or_else(|| VaultError::RecordNotFound(record.id.to_string()))?;
        record.created_at = slot.created_at;
        record.modified_at = Utc::now();
        self.last_modified = record.modified_at;
        *slot = record;
        Ok(())
    }

    /// Remove a record by id, returning it.
    pub fn remove(&mut self, id: &Uuid) -> Result<AccountRecord> {
        let index = self
            .accounts
            .iter()
            .position(|record| record.id == *id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))?;
        self.last_modified = Utc::now();
        Ok(self.accounts.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut data = VaultData::default();
        let mut record = AccountRecord::new("mail");
        record.password = "hunter22".to_string();
        record.tags = vec!["work".to_string()];
        data.add(record);
        data.groups.push(AccountGroup {
            id: Uuid::new_v4(),
            group_name: "Work".to_string(),
            ..AccountGroup::default()
        });

        let bytes = data.to_bytes().unwrap();
        assert_eq!(VaultData::from_bytes(&bytes).unwrap(), data);
    }

    #[test]
    fn test_unknown_fields_ignored_missing_defaulted() {
        let json = br#"{"schema_version":7,"accounts":[{"account_name":"x","future":1}],"extra":true}"#;
        let data = VaultData::from_bytes(json).unwrap();
        assert_eq!(data.schema_version, 7);
        assert_eq!(data.accounts[0].account_name, "x");
        assert!(data.accounts[0].password.is_empty());
        assert!(data.groups.is_empty());
    }

    #[test]
    fn test_empty_payload_is_empty_store() {
        let data = VaultData::from_bytes(b"").unwrap();
        assert!(data.accounts.is_empty());
        assert_eq!(data.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        assert!(matches!(
            VaultData::from_bytes(b"\x00\x01not json"),
            Err(VaultError::Serialization(_))
        ));
    }

    #[test]
    fn test_add_update_remove() {
        let mut data = VaultData::default();
        let id = data.add(AccountRecord {
            account_name: "bank".to_string(),
            ..AccountRecord::default()
        });
        assert!(!id.is_nil());

        let mut edited = data.find(&id).unwrap().clone();
        edited.notes = "pin in safe".to_string();
        data.update(edited).unwrap();
        assert_eq!(data.find(&id).unwrap().notes, "pin in safe");

        let removed = data.remove(&id).unwrap();
        assert_eq!(removed.account_name, "bank");
        assert!(matches!(data.remove(&id), Err(VaultError::RecordNotFound(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut record = AccountRecord::new("mail");
        record.password = "super-secret-value".to_string();
        let output = format!("{:?}", record);
        assert!(output.contains("REDACTED"));
        assert!(!output.contains("super-secret-value"));
    }
}
