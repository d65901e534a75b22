//! Slot lookup, password verification and username-hash migration.
//!
//! Authentication is two-phase. First the supplied username is matched
//! against slots hashed under the policy's current algorithm and, while a
//! migration is active, against slots still on the previous one. Then the
//! password derives that slot's KEK and unwraps the DEK; a failed unwrap is
//! the password check. Every failure on this path is reported as
//! `AuthenticationFailed`.
//!
//! These are free functions over a borrowed [`VaultHeaderV2`]; the
//! orchestrator owns the header.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::crypto::{
    combine_with_second_factor, derive_kek, hash_username, random_bytes, unwrap_key,
    verify_username, wrap_key, DataKey, KeyEncryptionKey,
};
use crate::error::{Result, VaultError};
use crate::keyslot::{
    unix_timestamp, KeySlot, MigrationStatus, UserRole, VaultHeaderV2, VaultSecurityPolicy,
    KEK_SALT_SIZE, MAX_USERNAME_LEN, MIGRATION_FLAG_ACTIVE, USERNAME_SALT_SIZE, WRAPPED_KEY_SIZE,
};
use crate::second_factor::SecondFactor;

/// Where a username matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMatch {
    pub index: usize,
    /// Matched under the previous algorithm during a migration
    pub via_previous: bool,
}

/// Result of a successful login.
#[derive(Debug)]
pub struct Authenticated {
    pub slot_index: usize,
    pub dek: DataKey,
    /// The slot's username was rehashed and the header needs persisting
    pub migrated: bool,
}

/// Second-factor device plus the timeout to give it.
#[derive(Clone, Copy)]
pub struct FactorDevice<'a> {
    pub device: &'a dyn SecondFactor,
    pub timeout: Duration,
}

/// Check a username is storable: 1..=255 bytes, no control characters.
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(VaultError::InvalidUsername(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(VaultError::InvalidUsername(format!(
            "Username exceeds {} bytes",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(VaultError::InvalidUsername(
            "Username contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Find the active slot for `username`.
pub fn locate_slot(header: &VaultHeaderV2, username: &str) -> Option<SlotMatch> {
    let policy = &header.security_policy;

    let current = policy.username_hash_algorithm;
    for (index, slot) in header.key_slots.iter().enumerate() {
        if slot.active
            && slot.username_hash_algorithm == current
            && verify_username(username, &slot.username, current, &slot.username_salt, policy)
        {
            debug!(index, "slot matched under current algorithm");
            return Some(SlotMatch {
                index,
                via_previous: false,
            });
        }
    }

    if policy.migration_active() {
        let previous = policy.previous_username_hash_algorithm;
        for (index, slot) in header.key_slots.iter().enumerate() {
            if slot.active
                && slot.username_hash_algorithm == previous
                && verify_username(username, &slot.username, previous, &slot.username_salt, policy)
            {
                debug!(index, "slot matched under previous algorithm");
                return Some(SlotMatch {
                    index,
                    via_previous: true,
                });
            }
        }
    }

    None
}

/// Derive the KEK for `slot`, folding in the second factor when enrolled.
pub fn slot_kek(
    slot: &KeySlot,
    password: &str,
    policy: &VaultSecurityPolicy,
    factor: Option<FactorDevice<'_>>,
) -> Result<KeyEncryptionKey> {
    let kek = derive_kek(password, &slot.salt, slot.kek_algorithm, policy)?;
    if !slot.second_factor_enrolled {
        return Ok(kek);
    }
    let factor = factor.ok_or(VaultError::SecondFactorUnavailable)?;
    let response = factor
        .device
        .respond(&policy.second_factor_challenge, factor.timeout)?;
    combine_with_second_factor(&kek, &response)
}

/// Unwrap the DEK from `slot` with `password`.
///
/// # Errors
///
/// `AuthenticationFailed` for a wrong password or any KDF rejection;
/// second-factor errors pass through.
pub fn unlock_slot(
    slot: &KeySlot,
    password: &str,
    policy: &VaultSecurityPolicy,
    factor: Option<FactorDevice<'_>>,
) -> Result<DataKey> {
    let kek = slot_kek(slot, password, policy, factor).map_err(|e| match e {
        VaultError::SecondFactorUnavailable | VaultError::SecondFactorFailed(_) => e,
        _ => VaultError::AuthenticationFailed,
    })?;
    unwrap_key(&kek, &slot.wrapped_dek)
}

/// Authenticate `username`/`password` against the header.
///
/// On success the slot's last-login time is updated and, if the slot was
/// hashed under an older algorithm, its username is rehashed in place.
pub fn authenticate(
    header: &mut VaultHeaderV2,
    username: &str,
    password: &str,
    factor: Option<FactorDevice<'_>>,
) -> Result<Authenticated> {
    let Some(found) = locate_slot(header, username) else {
        // Spend a KDF anyway so unknown users cost the same
        let policy = &header.security_policy;
        let _ = derive_kek(password, &[0u8; KEK_SALT_SIZE], policy.kek_algorithm, policy);
        return Err(VaultError::AuthenticationFailed);
    };

    let dek = unlock_slot(
        &header.key_slots[found.index],
        password,
        &header.security_policy,
        factor,
    )?;

    let migrated = if header.key_slots[found.index].username_hash_algorithm
        != header.security_policy.username_hash_algorithm
    {
        migrate_slot(header, found.index, username)
    } else {
        false
    };

    header.key_slots[found.index].last_login_at = unix_timestamp();
    Ok(Authenticated {
        slot_index: found.index,
        dek,
        migrated,
    })
}

/// Rehash a slot's username under the current algorithm.
///
/// The slot passes through `Pending` and lands on `Migrated`; if rehashing
/// fails it stays `Pending` and the login still succeeds. Returns whether
/// the header changed.
pub fn migrate_slot(header: &mut VaultHeaderV2, index: usize, username: &str) -> bool {
    let policy = header.security_policy.clone();
    let slot = &mut header.key_slots[index];
    slot.migration_status = MigrationStatus::Pending;

    let rehashed = random_bytes::<USERNAME_SALT_SIZE>().and_then(|salt| {
        hash_username(username, policy.username_hash_algorithm, &salt, &policy)
            .map(|hash| (salt, hash))
    });
    match rehashed {
        Ok((salt, hash)) => {
            slot.username = hash;
            slot.username_salt = salt;
            slot.username_hash_algorithm = policy.username_hash_algorithm;
            slot.migration_status = MigrationStatus::Migrated;
            slot.migrated_at = unix_timestamp();
            info!(
                slot = index,
                algorithm = %policy.username_hash_algorithm,
                "username hash migrated"
            );
        }
        Err(e) => warn!(slot = index, error = %e, "username rehash failed; slot left pending"),
    }

    refresh_migration_flag(header);
    true
}

/// Clear the active-migration bit once no active slot uses the previous algorithm.
pub fn refresh_migration_flag(header: &mut VaultHeaderV2) {
    let policy = &header.security_policy;
    if policy.migration_flags & MIGRATION_FLAG_ACTIVE == 0 {
        return;
    }
    let previous = policy.previous_username_hash_algorithm;
    let current = policy.username_hash_algorithm;
    let remaining = header
        .active_slots()
        .filter(|slot| slot.username_hash_algorithm == previous && previous != current)
        .count();
    if remaining == 0 {
        header.security_policy.migration_flags &= !MIGRATION_FLAG_ACTIVE;
        info!("username hash migration complete");
    }
}

/// Build a fresh slot holding `dek` for `username`.
///
/// The slot uses the policy's current username algorithm and KEK
/// algorithm. When `factor` is supplied the slot is enrolled with it.
pub fn create_slot(
    username: &str,
    password: &str,
    role: UserRole,
    must_change_password: bool,
    policy: &VaultSecurityPolicy,
    dek: &DataKey,
    factor: Option<FactorDevice<'_>>,
) -> Result<KeySlot> {
    validate_username(username)?;
    let username_salt = random_bytes::<USERNAME_SALT_SIZE>()?;
    let now = unix_timestamp();

    let mut slot = KeySlot {
        active: true,
        kek_algorithm: policy.kek_algorithm,
        username_hash_algorithm: policy.username_hash_algorithm,
        username: hash_username(username, policy.username_hash_algorithm, &username_salt, policy)?,
        username_salt,
        salt: [0u8; KEK_SALT_SIZE],
        wrapped_dek: [0u8; WRAPPED_KEY_SIZE],
        role,
        must_change_password,
        password_changed_at: now,
        last_login_at: 0,
        migration_status: MigrationStatus::NotMigrated,
        migrated_at: 0,
        second_factor_enrolled: factor.is_some(),
        second_factor_enrolled_at: if factor.is_some() { now } else { 0 },
    };
    rewrap_slot(&mut slot, password, policy, dek, factor)?;
    Ok(slot)
}

/// Re-wrap `dek` into `slot` under a new password and fresh salt.
///
/// Only the salt, wrapped key, KEK algorithm and password timestamp
/// change; enrollment follows `slot.second_factor_enrolled`.
pub fn rewrap_slot(
    slot: &mut KeySlot,
    password: &str,
    policy: &VaultSecurityPolicy,
    dek: &DataKey,
    factor: Option<FactorDevice<'_>>,
) -> Result<()> {
    let mut staged = slot.clone();
    staged.salt = random_bytes::<KEK_SALT_SIZE>()?;
    staged.kek_algorithm = policy.kek_algorithm;
    let kek = slot_kek(&staged, password, policy, factor)?;
    staged.wrapped_dek = wrap_key(&kek, dek)?;
    staged.password_changed_at = unix_timestamp();
    *slot = staged;
    Ok(())
}
