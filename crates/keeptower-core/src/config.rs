//! Runtime settings for the vault orchestrator.
//!
//! Passed in explicitly; nothing here is global. Per-vault security
//! settings live in [`crate::keyslot::VaultSecurityPolicy`] inside the file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fec::validate_redundancy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Payload FEC redundancy for new vaults: 0 disables, otherwise 5..=50
    pub fec_redundancy: u8,
    pub backups_enabled: bool,
    /// Timestamped backups kept per vault
    pub max_backups: usize,
    pub second_factor_timeout_secs: u64,
    /// Re-read and decrypt every file right after writing it
    pub verify_writes: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            fec_redundancy: 10,
            backups_enabled: true,
            max_backups: 5,
            second_factor_timeout_secs: 15,
            verify_writes: true,
        }
    }
}

impl VaultConfig {
    pub fn second_factor_timeout(&self) -> Duration {
        Duration::from_secs(self.second_factor_timeout_secs)
    }

    /// # Errors
    ///
    /// `InvalidData` for a non-zero redundancy outside 5..=50.
    pub fn validate(&self) -> Result<()> {
        if self.fec_redundancy != 0 {
            validate_redundancy(self.fec_redundancy)?;
        }
        Ok(())
    }
}
