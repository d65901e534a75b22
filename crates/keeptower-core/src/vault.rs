//! Vault lifecycle: create, open, modify, save, close.
//!
//! [`VaultManager`] is the single writer for one vault file. All state of
//! the open vault lives in one [`VaultState`] behind a mutex; the key-slot,
//! crypto and format modules are stateless functions it borrows that state
//! into.
//!
//! Every save re-encodes the whole file and stages it next to the target.
//! The staged copy is read back to prove the FEC and AEAD layers round-trip
//! before it is renamed into place. Across processes the last writer wins.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{
    authenticate, create_slot, locate_slot, migrate_slot, refresh_migration_flag, rewrap_slot,
    unlock_slot, validate_username, FactorDevice,
};
use crate::config::VaultConfig;
use crate::crypto::{
    decrypt_payload, encrypt_payload, generate_data_key, random_bytes, validate_password, DataKey,
    EncryptedPayload,
};
use crate::error::{Result, VaultError};
use crate::fs;
use crate::format::v1::VaultFileV1;
use crate::format::v2::{self, V2FileHeader};
use crate::format::{detect_version, header_redundancy, SALT_SIZE, VERSION_V1, VERSION_V2};
use crate::keyslot::{
    unix_timestamp, KekAlgorithm, KeySlot, MigrationStatus, UserRole, UsernameHashAlgorithm,
    VaultHeaderV2, VaultSecurityPolicy, CHALLENGE_SIZE, KEK_SALT_SIZE, MAX_KEY_SLOTS,
    MIGRATION_FLAG_ACTIVE, WRAPPED_KEY_SIZE,
};
use crate::records::{AccountRecord, VaultData};
use crate::second_factor::SecondFactor;

/// Suffix of the copy kept when a V1 vault is upgraded.
pub const V1_BACKUP_SUFFIX: &str = ".v1.backup";

/// Length bounds for the administrator created by a V1 upgrade.
const MIGRATION_ADMIN_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

/// The authenticated user of an open vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub role: UserRole,
    pub slot_index: usize,
    /// Record access is blocked until the password is changed
    pub must_change_password: bool,
    /// Policy requires a second factor this slot has not enrolled
    pub second_factor_enrollment_required: bool,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Summary of one active key slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub slot_index: usize,
    /// Known only for plaintext slots and the session's own slot
    pub username: Option<String>,
    pub role: UserRole,
    pub must_change_password: bool,
    pub password_changed_at: u64,
    pub last_login_at: u64,
    pub username_hash_algorithm: UsernameHashAlgorithm,
    pub kek_algorithm: KekAlgorithm,
    pub migration_status: MigrationStatus,
    pub second_factor_enrolled: bool,
}

/// Credential-free view of a vault file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultInfo {
    pub version: u32,
    pub file_size: u64,
    pub kdf_iterations: u32,
    /// Redundancy the header section was coded with
    pub header_redundancy: Option<u8>,
    /// Redundancy of the payload section, `None` when stored raw
    pub payload_redundancy: Option<u8>,
    pub slot_count: usize,
    pub active_slots: usize,
    pub security_policy: Option<VaultSecurityPolicy>,
    pub second_factor_required: bool,
}

/// Everything held while a vault is open.
struct VaultState {
    path: PathBuf,
    header: VaultHeaderV2,
    dek: DataKey,
    data: VaultData,
    session: Session,
    data_salt: [u8; SALT_SIZE],
    fec_redundancy: u8,
    /// Last encrypted payload; reused while the records are unchanged
    payload: Option<EncryptedPayload>,
    records_dirty: bool,
    header_dirty: bool,
}

impl VaultState {
    fn require_admin(&self) -> Result<()> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(VaultError::PermissionDenied(
                "administrator role required".to_string(),
            ))
        }
    }

    fn require_password_current(&self) -> Result<()> {
        if self.session.must_change_password {
            Err(VaultError::PasswordChangeRequired)
        } else {
            Ok(())
        }
    }

    fn find_user(&self, username: &str) -> Result<usize> {
        locate_slot(&self.header, username)
            .map(|found| found.index)
            .ok_or(VaultError::UserNotFound)
    }

    fn policy(&self) -> &VaultSecurityPolicy {
        &self.header.security_policy
    }
}

/// Owns an open vault and serializes every operation on it.
pub struct VaultManager {
    config: VaultConfig,
    second_factor: Option<Box<dyn SecondFactor>>,
    state: Mutex<Option<VaultState>>,
}

impl VaultManager {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            second_factor: None,
            state: Mutex::new(None),
        }
    }

    /// Attach the challenge-response device used for enrolled slots.
    pub fn with_second_factor(mut self, device: Box<dyn SecondFactor>) -> Self {
        self.second_factor = Some(device);
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, Option<VaultState>>> {
        self.state.lock().map_err(|_| VaultError::LockPoisoned)
    }

    fn factor(&self) -> Option<FactorDevice<'_>> {
        self.second_factor.as_deref().map(|device| FactorDevice {
            device,
            timeout: self.config.second_factor_timeout(),
        })
    }

    fn require_closed(guard: &Option<VaultState>) -> Result<()> {
        if guard.is_some() {
            Err(VaultError::VaultAlreadyOpen)
        } else {
            Ok(())
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock_state().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Create a new V2 vault with one administrator and open it.
    ///
    /// # Arguments
    ///
    /// * `path` - Where the vault file is written; must not exist
    /// * `admin_username` - First administrator
    /// * `admin_password` - Must satisfy the policy's minimum length
    /// * `policy` - Security policy for the vault's lifetime
    ///
    /// # Errors
    ///
    /// `FileWriteFailed` if the file exists, `InvalidPolicy`/`WeakPassword`
    /// for rejected input, `SecondFactorUnavailable` when the policy needs
    /// a device and none is attached.
    pub fn create(
        &self,
        path: &Path,
        admin_username: &str,
        admin_password: &str,
        mut policy: VaultSecurityPolicy,
    ) -> Result<Session> {
        let mut guard = self.lock_state()?;
        Self::require_closed(&guard)?;

        if path.exists() {
            return Err(VaultError::FileWriteFailed(format!(
                "{} already exists",
                path.display()
            )));
        }
        self.config.validate()?;
        policy.validate()?;
        validate_username(admin_username)?;
        validate_password(admin_password, policy.min_password_length)?;

        policy.migration_flags = 0;
        policy.migration_started_at = 0;
        policy.previous_username_hash_algorithm = policy.username_hash_algorithm;

        let factor = if policy.require_second_factor {
            ensure_challenge(&mut policy)?;
            Some(self.factor().ok_or(VaultError::SecondFactorUnavailable)?)
        } else {
            None
        };

        let dek = generate_data_key()?;
        let slot = create_slot(
            admin_username,
            admin_password,
            UserRole::Administrator,
            false,
            &policy,
            &dek,
            factor,
        )?;
        let mut header = VaultHeaderV2::new(policy);
        header.key_slots.push(slot);

        let mut state = VaultState {
            path: path.to_path_buf(),
            header,
            dek,
            data: VaultData::default(),
            session: Session {
                username: admin_username.to_string(),
                role: UserRole::Administrator,
                slot_index: 0,
                must_change_password: false,
                second_factor_enrollment_required: false,
            },
            data_salt: random_bytes::<SALT_SIZE>()?,
            fec_redundancy: self.config.fec_redundancy,
            payload: None,
            records_dirty: true,
            header_dirty: true,
        };
        self.persist(&mut state)?;

        info!(path = %path.display(), users = 1, "vault created");
        let session = state.session.clone();
        *guard = Some(state);
        Ok(session)
    }

    /// Authenticate against a V2 vault and hold it open.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` for an unknown user, wrong password or a
    /// payload that fails authentication; `UnsupportedVersion(1)` for a V1
    /// file (use [`migrate_v1_to_v2`](Self::migrate_v1_to_v2)); FEC and
    /// format errors when the file is damaged beyond repair.
    pub fn open(&self, path: &Path, username: &str, password: &str) -> Result<Session> {
        let mut guard = self.lock_state()?;
        Self::require_closed(&guard)?;

        let bytes = fs::read_file(path)?;
        match detect_version(&bytes)? {
            VERSION_V2 => {}
            other => return Err(VaultError::UnsupportedVersion(other)),
        }
        let (file_header, ciphertext) = v2::read_vault(&bytes)?;
        drop(bytes);

        let mut header = file_header.vault_header;
        let auth = authenticate(&mut header, username, password, self.factor())?;

        let plaintext = decrypt_payload(auth.dek.as_bytes(), &file_header.data_nonce, &ciphertext)?;
        let data = VaultData::from_bytes(&plaintext)?;

        let slot = &header.key_slots[auth.slot_index];
        let session = Session {
            username: username.to_string(),
            role: slot.role,
            slot_index: auth.slot_index,
            must_change_password: slot.must_change_password,
            second_factor_enrollment_required: header.security_policy.require_second_factor
                && !slot.second_factor_enrolled,
        };

        let mut state = VaultState {
            path: path.to_path_buf(),
            header,
            dek: auth.dek,
            data,
            session,
            data_salt: file_header.data_salt,
            fec_redundancy: if file_header.payload_fec {
                file_header.fec_redundancy
            } else {
                0
            },
            payload: Some(EncryptedPayload {
                nonce: file_header.data_nonce,
                ciphertext,
            }),
            records_dirty: false,
            header_dirty: true,
        };

        if auth.migrated {
            if let Err(e) = self.persist(&mut state) {
                warn!(error = %e, "could not persist username migration; will retry on save");
            }
        }

        info!(
            path = %path.display(),
            slot = state.session.slot_index,
            role = %state.session.role,
            "vault opened"
        );
        let session = state.session.clone();
        *guard = Some(state);
        Ok(session)
    }

    /// Write the open vault to disk.
    pub fn save(&self) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        self.persist(state)
    }

    /// Save pending changes and release the vault.
    ///
    /// If the final save fails the vault stays open so it can be retried.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        if state.records_dirty || state.header_dirty {
            self.persist(state)?;
        }
        if let Some(state) = guard.take() {
            info!(path = %state.path.display(), "vault closed");
        }
        Ok(())
    }

    pub fn session(&self) -> Result<Session> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(VaultError::VaultNotOpen)?;
        Ok(state.session.clone())
    }

    pub fn security_policy(&self) -> Result<VaultSecurityPolicy> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(VaultError::VaultNotOpen)?;
        Ok(state.policy().clone())
    }

    /// Path of the open vault.
    pub fn path(&self) -> Result<PathBuf> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(VaultError::VaultNotOpen)?;
        Ok(state.path.clone())
    }

    // ---- users ----

    pub fn list_users(&self) -> Result<Vec<UserInfo>> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(VaultError::VaultNotOpen)?;

        Ok(state
            .header
            .key_slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .map(|(index, slot)| UserInfo {
                slot_index: index,
                username: display_name(slot, index, &state.session),
                role: slot.role,
                must_change_password: slot.must_change_password,
                password_changed_at: slot.password_changed_at,
                last_login_at: slot.last_login_at,
                username_hash_algorithm: slot.username_hash_algorithm,
                kek_algorithm: slot.kek_algorithm,
                migration_status: slot.migration_status,
                second_factor_enrolled: slot.second_factor_enrolled,
            })
            .collect())
    }

    /// Enroll a new user holding the vault's DEK.
    ///
    /// The user must change `temporary_password` on first login. The first
    /// inactive slot is reused before the table grows.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `UserAlreadyExists`,
    /// `MaxUsersReached` at 32 slots, `WeakPassword`, `InvalidUsername`.
    pub fn add_user(&self, username: &str, temporary_password: &str, role: UserRole) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_admin()?;
        state.require_password_current()?;

        validate_username(username)?;
        validate_password(temporary_password, state.policy().min_password_length)?;
        if locate_slot(&state.header, username).is_some() {
            return Err(VaultError::UserAlreadyExists);
        }

        let reuse = state.header.key_slots.iter().position(|slot| !slot.active);
        if reuse.is_none() && state.header.key_slots.len() >= MAX_KEY_SLOTS {
            return Err(VaultError::MaxUsersReached(MAX_KEY_SLOTS));
        }

        let slot = create_slot(
            username,
            temporary_password,
            role,
            true,
            state.policy(),
            &state.dek,
            None,
        )?;

        let previous = state.header.clone();
        let index = match reuse {
            Some(index) => {
                state.header.key_slots[index] = slot;
                index
            }
            None => {
                state.header.key_slots.push(slot);
                state.header.key_slots.len() - 1
            }
        };
        self.commit_header(state, previous)?;

        info!(slot = index, role = %role, "user added");
        Ok(())
    }

    /// Deactivate a user's slot.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins, `SelfRemovalNotAllowed`,
    /// `LastAdministrator`, `UserNotFound`.
    pub fn remove_user(&self, username: &str) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_admin()?;
        state.require_password_current()?;

        let index = state.find_user(username)?;
        if index == state.session.slot_index {
            return Err(VaultError::SelfRemovalNotAllowed);
        }
        if state.header.key_slots[index].role.is_admin() && state.header.active_admin_count() <= 1 {
            return Err(VaultError::LastAdministrator);
        }

        let previous = state.header.clone();
        let slot = &mut state.header.key_slots[index];
        slot.active = false;
        slot.wrapped_dek = [0u8; WRAPPED_KEY_SIZE];
        slot.salt = [0u8; KEK_SALT_SIZE];
        refresh_migration_flag(&mut state.header);
        self.commit_header(state, previous)?;

        info!(slot = index, "user removed");
        Ok(())
    }

    /// Change a password after proving the old one.
    ///
    /// Users may change their own password; administrators may change
    /// anyone's. Only the target slot's salt and wrapped key change.
    ///
    /// # Errors
    ///
    /// `PermissionDenied`, `UserNotFound`, `AuthenticationFailed` for a
    /// wrong `old_password`, `WeakPassword` for a short or unchanged
    /// `new_password`.
    pub fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;

        let index = state.find_user(username)?;
        let own = index == state.session.slot_index;
        if !own {
            state.require_admin()?;
            state.require_password_current()?;
        }

        validate_password(new_password, state.policy().min_password_length)?;
        if new_password == old_password {
            return Err(VaultError::WeakPassword(
                "New password must differ from the current password".to_string(),
            ));
        }

        let factor = self.factor();
        let policy = state.policy().clone();
        unlock_slot(&state.header.key_slots[index], old_password, &policy, factor)?;

        let previous = state.header.clone();
        let slot = &mut state.header.key_slots[index];
        rewrap_slot(slot, new_password, &policy, &state.dek, factor)?;
        slot.must_change_password = false;
        self.commit_header(state, previous)?;

        if own {
            state.session.must_change_password = false;
        }
        info!(slot = index, own, "password changed");
        Ok(())
    }

    /// Set a temporary password for another user.
    ///
    /// The user must change it on next login and loses any second-factor
    /// enrollment.
    pub fn admin_reset_password(&self, username: &str, temporary_password: &str) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_admin()?;
        state.require_password_current()?;

        let index = state.find_user(username)?;
        if index == state.session.slot_index {
            return Err(VaultError::PermissionDenied(
                "use change_password for your own account".to_string(),
            ));
        }
        validate_password(temporary_password, state.policy().min_password_length)?;

        let policy = state.policy().clone();
        let mut staged = state.header.key_slots[index].clone();
        staged.second_factor_enrolled = false;
        staged.second_factor_enrolled_at = 0;
        staged.must_change_password = true;
        rewrap_slot(&mut staged, temporary_password, &policy, &state.dek, None)?;

        let previous = state.header.clone();
        state.header.key_slots[index] = staged;
        self.commit_header(state, previous)?;

        info!(slot = index, "password reset by administrator");
        Ok(())
    }

    // ---- policy ----

    /// Replace the adjustable parts of the security policy.
    ///
    /// KDF parameters and the username algorithm are fixed once slots
    /// exist; the second-factor requirement can be raised but never
    /// cleared.
    ///
    /// # Errors
    ///
    /// `PermissionDenied`, `InvalidPolicy`, `PolicyDowngrade`.
    pub fn update_security_policy(&self, policy: VaultSecurityPolicy) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_admin()?;
        state.require_password_current()?;
        policy.validate()?;

        let current = state.policy().clone();
        if current.require_second_factor && !policy.require_second_factor {
            return Err(VaultError::PolicyDowngrade(
                "the second-factor requirement cannot be removed".to_string(),
            ));
        }
        if policy.kdf_iterations != current.kdf_iterations
            || policy.argon2_memory_kib != current.argon2_memory_kib
            || policy.argon2_iterations != current.argon2_iterations
            || policy.argon2_parallelism != current.argon2_parallelism
        {
            return Err(VaultError::InvalidPolicy(
                "KDF parameters cannot change on an existing vault".to_string(),
            ));
        }
        if policy.username_hash_algorithm != current.username_hash_algorithm {
            return Err(VaultError::InvalidPolicy(
                "use a username hash migration to change the username algorithm".to_string(),
            ));
        }

        let mut updated = VaultSecurityPolicy {
            require_second_factor: policy.require_second_factor,
            second_factor_algorithm: policy.second_factor_algorithm,
            min_password_length: policy.min_password_length,
            kek_algorithm: policy.kek_algorithm,
            ..current
        };
        if updated.require_second_factor {
            ensure_challenge(&mut updated)?;
        }

        let previous = state.header.clone();
        state.header.security_policy = updated;
        self.commit_header(state, previous)?;

        let own = &state.header.key_slots[state.session.slot_index];
        state.session.second_factor_enrollment_required =
            state.header.security_policy.require_second_factor && !own.second_factor_enrolled;

        info!(
            require_second_factor = state.policy().require_second_factor,
            min_password_length = state.policy().min_password_length,
            "security policy updated"
        );
        Ok(())
    }

    /// Start moving every slot to `algorithm`, one login at a time.
    ///
    /// # Errors
    ///
    /// `InvalidPolicy` when `algorithm` is already current or another
    /// migration has not finished.
    pub fn enable_username_hash_migration(&self, algorithm: UsernameHashAlgorithm) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_admin()?;
        state.require_password_current()?;

        let current = state.policy().username_hash_algorithm;
        if algorithm == current {
            return Err(VaultError::InvalidPolicy(format!(
                "usernames already use {}",
                algorithm
            )));
        }
        if state.policy().migration_active() {
            return Err(VaultError::InvalidPolicy(
                "a username hash migration is already in progress".to_string(),
            ));
        }

        let previous = state.header.clone();
        let policy = &mut state.header.security_policy;
        policy.previous_username_hash_algorithm = current;
        policy.username_hash_algorithm = algorithm;
        policy.migration_flags |= MIGRATION_FLAG_ACTIVE;
        policy.migration_started_at = unix_timestamp();
        for slot in state.header.key_slots.iter_mut().filter(|slot| slot.active) {
            if slot.username_hash_algorithm != algorithm {
                slot.migration_status = MigrationStatus::NotMigrated;
            }
        }
        refresh_migration_flag(&mut state.header);
        self.commit_header(state, previous)?;

        info!(from = %current, to = %algorithm, "username hash migration enabled");
        Ok(())
    }

    /// Rehash the session user's own slot under the current algorithm now.
    pub fn migrate_own_username(&self) -> Result<bool> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        let index = state.session.slot_index;
        if state.header.key_slots[index].username_hash_algorithm
            == state.policy().username_hash_algorithm
        {
            return Ok(false);
        }
        let previous = state.header.clone();
        let username = state.session.username.clone();
        migrate_slot(&mut state.header, index, &username);
        self.commit_header(state, previous)?;
        Ok(true)
    }

    /// Bind the session user's slot to the attached second-factor device.
    ///
    /// # Errors
    ///
    /// `SecondFactorUnavailable` without a device, `AuthenticationFailed`
    /// for a wrong password, `InvalidPolicy` if already enrolled.
    pub fn enroll_second_factor(&self, password: &str) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        let factor = self.factor().ok_or(VaultError::SecondFactorUnavailable)?;

        let index = state.session.slot_index;
        if state.header.key_slots[index].second_factor_enrolled {
            return Err(VaultError::InvalidPolicy(
                "second factor already enrolled".to_string(),
            ));
        }

        let previous = state.header.clone();
        ensure_challenge(&mut state.header.security_policy)?;
        let policy = state.policy().clone();
        if let Err(e) = unlock_slot(&state.header.key_slots[index], password, &policy, None) {
            state.header = previous;
            return Err(e);
        }

        let mut staged = state.header.key_slots[index].clone();
        staged.second_factor_enrolled = true;
        staged.second_factor_enrolled_at = unix_timestamp();
        if let Err(e) = rewrap_slot(&mut staged, password, &policy, &state.dek, Some(factor)) {
            state.header = previous;
            return Err(e);
        }
        state.header.key_slots[index] = staged;
        self.commit_header(state, previous)?;

        state.session.second_factor_enrollment_required = false;
        info!(slot = index, "second factor enrolled");
        Ok(())
    }

    // ---- records ----

    pub fn records(&self) -> Result<Vec<AccountRecord>> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(VaultError::VaultNotOpen)?;
        state.require_password_current()?;
        Ok(state.data.accounts.clone())
    }

    pub fn record(&self, id: &Uuid) -> Result<AccountRecord> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(VaultError::VaultNotOpen)?;
        state.require_password_current()?;
        state
            .data
            .find(id)
            .cloned()
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))
    }

    /// Add a record; changes stay in memory until the next save.
    pub fn add_record(&self, record: AccountRecord) -> Result<Uuid> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_password_current()?;
        let id = state.data.add(record);
        state.records_dirty = true;
        debug!(%id, "record added");
        Ok(id)
    }

    pub fn update_record(&self, record: AccountRecord) -> Result<()> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_password_current()?;
        state.data.update(record)?;
        state.records_dirty = true;
        Ok(())
    }

    pub fn remove_record(&self, id: &Uuid) -> Result<AccountRecord> {
        let mut guard = self.lock_state()?;
        let state = guard.as_mut().ok_or(VaultError::VaultNotOpen)?;
        state.require_password_current()?;
        let removed = state.data.remove(id)?;
        state.records_dirty = true;
        debug!(%id, "record removed");
        Ok(removed)
    }

    // ---- V1 upgrade ----

    /// Convert a single-user V1 vault into a V2 vault and open it.
    ///
    /// The original is copied to `<file>.v1.backup` before anything is
    /// written. If writing or verifying the V2 file fails the original
    /// bytes are put back.
    ///
    /// # Arguments
    ///
    /// * `path` - The V1 vault
    /// * `v1_password` - Password the V1 file was sealed with
    /// * `admin_username` - Administrator for the new vault (3 to 32 characters)
    /// * `admin_password` - That administrator's password
    /// * `policy` - Policy for the V2 vault
    pub fn migrate_v1_to_v2(
        &self,
        path: &Path,
        v1_password: &str,
        admin_username: &str,
        admin_password: &str,
        mut policy: VaultSecurityPolicy,
    ) -> Result<Session> {
        let mut guard = self.lock_state()?;
        Self::require_closed(&guard)?;

        let name_len = admin_username.chars().count();
        if !MIGRATION_ADMIN_NAME_LEN.contains(&name_len) {
            return Err(VaultError::InvalidUsername(format!(
                "Administrator username must be {} to {} characters",
                MIGRATION_ADMIN_NAME_LEN.start(),
                MIGRATION_ADMIN_NAME_LEN.end()
            )));
        }
        validate_username(admin_username)?;
        policy.validate()?;
        validate_password(admin_password, policy.min_password_length)?;
        self.config.validate()?;

        let original = fs::read_file(path)?;
        let legacy = VaultFileV1::parse(&original)?;
        let plaintext = legacy.open(
            v1_password,
            self.second_factor.as_deref(),
            self.config.second_factor_timeout(),
        )?;
        let data = VaultData::from_bytes(&plaintext)?;
        drop(plaintext);

        policy.migration_flags = 0;
        policy.migration_started_at = 0;
        policy.previous_username_hash_algorithm = policy.username_hash_algorithm;
        if let Some(second_factor) = &legacy.second_factor {
            if policy.second_factor_challenge == [0u8; CHALLENGE_SIZE] {
                policy.second_factor_challenge = second_factor.challenge;
            }
        }
        let factor = if policy.require_second_factor {
            ensure_challenge(&mut policy)?;
            Some(self.factor().ok_or(VaultError::SecondFactorUnavailable)?)
        } else {
            None
        };

        let dek = generate_data_key()?;
        let slot = create_slot(
            admin_username,
            admin_password,
            UserRole::Administrator,
            false,
            &policy,
            &dek,
            factor,
        )?;
        let mut header = VaultHeaderV2::new(policy);
        header.key_slots.push(slot);

        let mut state = VaultState {
            path: path.to_path_buf(),
            header,
            dek,
            data,
            session: Session {
                username: admin_username.to_string(),
                role: UserRole::Administrator,
                slot_index: 0,
                must_change_password: false,
                second_factor_enrollment_required: false,
            },
            data_salt: random_bytes::<SALT_SIZE>()?,
            fec_redundancy: legacy.fec_redundancy.unwrap_or(self.config.fec_redundancy),
            payload: None,
            records_dirty: true,
            header_dirty: true,
        };
        let bytes = encode_state(&mut state)?;

        let backup = v1_backup_path(path);
        fs::copy_atomic(path, &backup)?;
        info!(backup = %backup.display(), "V1 vault backed up");

        let written = fs::write_atomic_checked(path, &bytes, |staged| {
            verify_written(staged, &bytes, &state.dek)
        });
        if let Err(e) = written {
            warn!(error = %e, "V2 write failed; restoring V1 vault");
            if let Err(restore) = fs::write_atomic(path, &original) {
                warn!(error = %restore, backup = %backup.display(), "restore failed; V1 copy kept");
            }
            return Err(e);
        }
        state.header_dirty = false;

        info!(
            path = %path.display(),
            accounts = state.data.accounts.len(),
            "vault upgraded from V1 to V2"
        );
        let session = state.session.clone();
        *guard = Some(state);
        Ok(session)
    }

    // ---- backups ----

    /// Backups of `path`, newest first.
    pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>> {
        fs::list_backups(path)
    }

    /// Copy the newest backup over `path`.
    ///
    /// # Errors
    ///
    /// `VaultAlreadyOpen` while a vault is open, `FileNotFound` when no
    /// backup exists.
    pub fn restore_from_backup(&self, path: &Path) -> Result<PathBuf> {
        let guard = self.lock_state()?;
        Self::require_closed(&guard)?;

        let newest = fs::list_backups(path)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                VaultError::FileNotFound(format!("no backups of {}", path.display()))
            })?;
        fs::copy_atomic(&newest, path)?;
        info!(backup = %newest.display(), "vault restored from backup");
        Ok(newest)
    }

    // ---- inspection ----

    /// Read what the file header says without credentials.
    pub fn inspect(path: &Path) -> Result<VaultInfo> {
        let bytes = fs::read_file(path)?;
        let file_size = bytes.len() as u64;
        let version = match detect_version(&bytes) {
            Ok(version) => version,
            Err(VaultError::CorruptedFile(_)) if VaultFileV1::parse(&bytes).is_ok() => VERSION_V1,
            Err(e) => return Err(e),
        };

        if version == VERSION_V1 {
            let legacy = VaultFileV1::parse(&bytes)?;
            return Ok(VaultInfo {
                version,
                file_size,
                kdf_iterations: legacy.iterations,
                header_redundancy: None,
                payload_redundancy: legacy.fec_redundancy,
                slot_count: 1,
                active_slots: 1,
                security_policy: None,
                second_factor_required: legacy.second_factor.is_some(),
            });
        }
        if version != VERSION_V2 {
            return Err(VaultError::UnsupportedVersion(version));
        }

        let (header, _) = v2::read_header(&bytes)?;
        let vault = &header.vault_header;
        Ok(VaultInfo {
            version,
            file_size,
            kdf_iterations: header.kdf_iterations,
            header_redundancy: header
                .header_fec
                .then(|| header_redundancy(header.fec_redundancy)),
            payload_redundancy: header.payload_fec.then_some(header.fec_redundancy),
            slot_count: vault.key_slots.len(),
            active_slots: vault.active_slots().count(),
            second_factor_required: vault.security_policy.require_second_factor,
            security_policy: Some(vault.security_policy.clone()),
        })
    }

    // ---- persistence ----

    /// Apply a header change to disk, restoring `previous` in memory on failure.
    fn commit_header(&self, state: &mut VaultState, previous: VaultHeaderV2) -> Result<()> {
        state.header_dirty = true;
        if let Err(e) = self.persist(state) {
            state.header = previous;
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self, state: &mut VaultState) -> Result<()> {
        let bytes = encode_state(state)?;

        if self.config.backups_enabled && state.path.exists() {
            match fs::create_backup(&state.path) {
                Ok(backup) => debug!(backup = %backup.display(), "backup created"),
                Err(e) => warn!(error = %e, "backup failed; continuing with save"),
            }
        }

        let verify = self.config.verify_writes;
        let dek = &state.dek;
        fs::write_atomic_checked(&state.path, &bytes, |staged| {
            if verify {
                verify_written(staged, &bytes, dek)
            } else {
                Ok(())
            }
        })?;

        if self.config.backups_enabled {
            match fs::cleanup_backups(&state.path, self.config.max_backups) {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "old backups rotated out"),
                Err(e) => warn!(error = %e, "backup rotation failed"),
            }
        }

        state.header_dirty = false;
        debug!(
            path = %state.path.display(),
            bytes = bytes.len(),
            redundancy = state.fec_redundancy,
            "vault saved"
        );
        Ok(())
    }
}

/// Serialize the open vault into file bytes, encrypting records if changed.
fn encode_state(state: &mut VaultState) -> Result<Vec<u8>> {
    if state.records_dirty || state.payload.is_none() {
        state.data.last_modified = chrono::Utc::now();
        let plaintext = state.data.to_bytes()?;
        state.payload = Some(encrypt_payload(state.dek.as_bytes(), &plaintext)?);
        state.records_dirty = false;
    }
    let payload = state
        .payload
        .as_ref()
        .ok_or_else(|| VaultError::Crypto("payload not encrypted".to_string()))?;

    let file_header = V2FileHeader {
        kdf_iterations: state.header.security_policy.kdf_iterations,
        header_fec: true,
        payload_fec: state.fec_redundancy != 0,
        fec_redundancy: state.fec_redundancy,
        vault_header: state.header.clone(),
        data_salt: state.data_salt,
        data_nonce: payload.nonce,
    };
    v2::write_vault(&file_header, &payload.ciphertext)
}

/// Read back a staged file and prove it decodes and decrypts.
fn verify_written(path: &Path, expected: &[u8], dek: &DataKey) -> Result<()> {
    let check = || -> Result<()> {
        let written = fs::read_file(path)?;
        if written != expected {
            return Err(VaultError::CorruptedFile(
                "file contents differ from what was written".to_string(),
            ));
        }
        let (header, ciphertext) = v2::read_vault(&written)?;
        decrypt_payload(dek.as_bytes(), &header.data_nonce, &ciphertext)?;
        Ok(())
    };
    check().map_err(|e| VaultError::CorruptedFile(format!("post-write verification failed: {}", e)))
}

/// Give the policy a random challenge if it has none yet.
fn ensure_challenge(policy: &mut VaultSecurityPolicy) -> Result<()> {
    if policy.second_factor_challenge == [0u8; CHALLENGE_SIZE] {
        policy.second_factor_challenge = random_bytes::<CHALLENGE_SIZE>()?;
    }
    Ok(())
}

fn display_name(slot: &KeySlot, index: usize, session: &Session) -> Option<String> {
    if index == session.slot_index {
        Some(session.username.clone())
    } else if slot.username_hash_algorithm == UsernameHashAlgorithm::Plaintext {
        Some(String::from_utf8_lossy(&slot.username).into_owned())
    } else {
        None
    }
}

/// `<file>.v1.backup` next to `path`.
pub fn v1_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(V1_BACKUP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::second_factor::testing::FakeToken;
    use tempfile::TempDir;

    const ADMIN_PW: &str = "admin-password-1";

    fn fast_policy() -> VaultSecurityPolicy {
        VaultSecurityPolicy {
            kdf_iterations: 1000,
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            min_password_length: 8,
            ..VaultSecurityPolicy::default()
        }
    }

    fn setup() -> (TempDir, PathBuf, VaultManager) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.vault");
        let manager = VaultManager::new(VaultConfig::default());
        manager.create(&path, "alice", ADMIN_PW, fast_policy()).unwrap();
        (temp_dir, path, manager)
    }

    #[test]
    fn test_create_opens_as_admin() {
        let (_dir, path, manager) = setup();
        assert!(path.exists());
        let session = manager.session().unwrap();
        assert!(session.is_admin());
        assert!(!session.must_change_password);
        manager.close().unwrap();
        assert!(!manager.is_open());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let (_dir, path, manager) = setup();
        manager.close().unwrap();
        let result = manager.create(&path, "alice", ADMIN_PW, fast_policy());
        assert!(matches!(result, Err(VaultError::FileWriteFailed(_))));
    }

    #[test]
    fn test_create_rejects_short_password() {
        let temp_dir = TempDir::new().unwrap();
        let manager = VaultManager::new(VaultConfig::default());
        let result = manager.create(&temp_dir.path().join("v"), "alice", "short", fast_policy());
        assert!(matches!(result, Err(VaultError::WeakPassword(_))));
    }

    #[test]
    fn test_open_twice_rejected() {
        let (_dir, path, manager) = setup();
        let result = manager.open(&path, "alice", ADMIN_PW);
        assert!(matches!(result, Err(VaultError::VaultAlreadyOpen)));
    }

    #[test]
    fn test_wrong_password_and_unknown_user_look_alike() {
        let (_dir, path, manager) = setup();
        manager.close().unwrap();
        let wrong = manager.open(&path, "alice", "wrong-password").unwrap_err();
        let unknown = manager.open(&path, "mallory", ADMIN_PW).unwrap_err();
        assert!(matches!(wrong, VaultError::AuthenticationFailed));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn test_records_survive_reopen() {
        let (_dir, path, manager) = setup();
        let mut record = AccountRecord::new("Email");
        record.password = "hunter22".to_string();
        let id = manager.add_record(record).unwrap();
        manager.close().unwrap();

        manager.open(&path, "alice", ADMIN_PW).unwrap();
        let loaded = manager.record(&id).unwrap();
        assert_eq!(loaded.account_name, "Email");
        assert_eq!(loaded.password, "hunter22");
    }

    #[test]
    fn test_new_user_must_change_password() {
        let (_dir, path, manager) = setup();
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.close().unwrap();

        let session = manager.open(&path, "bob", "bob-temp-pass").unwrap();
        assert!(session.must_change_password);
        assert!(matches!(manager.records(), Err(VaultError::PasswordChangeRequired)));

        manager.change_password("bob", "bob-temp-pass", "bob-real-pass").unwrap();
        assert!(!manager.session().unwrap().must_change_password);
        assert!(manager.records().unwrap().is_empty());
    }

    #[test]
    fn test_change_password_rejects_same_and_short() {
        let (_dir, _path, manager) = setup();
        assert!(matches!(
            manager.change_password("alice", ADMIN_PW, ADMIN_PW),
            Err(VaultError::WeakPassword(_))
        ));
        assert!(matches!(
            manager.change_password("alice", ADMIN_PW, "tiny"),
            Err(VaultError::WeakPassword(_))
        ));
        assert!(matches!(
            manager.change_password("alice", "not-the-password", "a-new-password"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_standard_user_cannot_administer() {
        let (_dir, path, manager) = setup();
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.close().unwrap();

        manager.open(&path, "bob", "bob-temp-pass").unwrap();
        manager.change_password("bob", "bob-temp-pass", "bob-real-pass").unwrap();
        assert!(matches!(
            manager.add_user("carol", "carol-pass-1", UserRole::Standard),
            Err(VaultError::PermissionDenied(_))
        ));
        assert!(matches!(
            manager.change_password("alice", ADMIN_PW, "stolen-password"),
            Err(VaultError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_remove_user_rules() {
        let (_dir, _path, manager) = setup();
        assert!(matches!(
            manager.remove_user("alice"),
            Err(VaultError::SelfRemovalNotAllowed)
        ));
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.remove_user("bob").unwrap();
        assert_eq!(manager.list_users().unwrap().len(), 1);
        assert!(matches!(manager.remove_user("bob"), Err(VaultError::UserNotFound)));
    }

    #[test]
    fn test_inactive_slot_reused() {
        let (_dir, _path, manager) = setup();
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.add_user("carol", "carol-temp-pass", UserRole::Standard).unwrap();
        manager.remove_user("bob").unwrap();
        manager.add_user("dave", "dave-temp-pass", UserRole::Standard).unwrap();

        let users = manager.list_users().unwrap();
        let indices: Vec<usize> = users.iter().map(|u| u.slot_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let (_dir, _path, manager) = setup();
        assert!(matches!(
            manager.add_user("alice", "another-pass", UserRole::Standard),
            Err(VaultError::UserAlreadyExists)
        ));
    }

    #[test]
    fn test_admin_reset_sets_must_change() {
        let (_dir, path, manager) = setup();
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.admin_reset_password("bob", "bob-reset-pass").unwrap();
        assert!(matches!(
            manager.admin_reset_password("alice", "whatever-pass"),
            Err(VaultError::PermissionDenied(_))
        ));
        manager.close().unwrap();

        assert!(manager.open(&path, "bob", "bob-temp-pass").is_err());
        let session = manager.open(&path, "bob", "bob-reset-pass").unwrap();
        assert!(session.must_change_password);
    }

    #[test]
    fn test_policy_downgrade_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2fa.vault");
        let manager = VaultManager::new(VaultConfig::default()).with_second_factor(Box::new(
            FakeToken {
                secret: b"device-secret".to_vec(),
            },
        ));
        let policy = VaultSecurityPolicy {
            require_second_factor: true,
            ..fast_policy()
        };
        manager.create(&path, "alice", ADMIN_PW, policy.clone()).unwrap();

        let relaxed = VaultSecurityPolicy {
            require_second_factor: false,
            ..policy
        };
        assert!(matches!(
            manager.update_security_policy(relaxed),
            Err(VaultError::PolicyDowngrade(_))
        ));
    }

    #[test]
    fn test_policy_kdf_change_rejected() {
        let (_dir, _path, manager) = setup();
        let policy = VaultSecurityPolicy {
            kdf_iterations: 2000,
            ..fast_policy()
        };
        assert!(matches!(
            manager.update_security_policy(policy),
            Err(VaultError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_policy_min_length_applies_to_new_users() {
        let (_dir, _path, manager) = setup();
        let policy = VaultSecurityPolicy {
            min_password_length: 16,
            ..manager.security_policy().unwrap()
        };
        manager.update_security_policy(policy).unwrap();
        assert!(matches!(
            manager.add_user("bob", "only-12-char", UserRole::Standard),
            Err(VaultError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_second_factor_required_without_device() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2fa.vault");
        let token = FakeToken {
            secret: b"device-secret".to_vec(),
        };
        let policy = VaultSecurityPolicy {
            require_second_factor: true,
            ..fast_policy()
        };
        let manager = VaultManager::new(VaultConfig::default()).with_second_factor(Box::new(token));
        manager.create(&path, "alice", ADMIN_PW, policy).unwrap();
        manager.close().unwrap();
        manager.open(&path, "alice", ADMIN_PW).unwrap();
        manager.close().unwrap();

        let bare = VaultManager::new(VaultConfig::default());
        assert!(matches!(
            bare.open(&path, "alice", ADMIN_PW),
            Err(VaultError::SecondFactorUnavailable)
        ));

        let other = VaultManager::new(VaultConfig::default()).with_second_factor(Box::new(
            FakeToken {
                secret: b"other-device".to_vec(),
            },
        ));
        assert!(matches!(
            other.open(&path, "alice", ADMIN_PW),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_enrollment_required_after_reset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2fa.vault");
        let manager = VaultManager::new(VaultConfig::default()).with_second_factor(Box::new(
            FakeToken {
                secret: b"device-secret".to_vec(),
            },
        ));
        let policy = VaultSecurityPolicy {
            require_second_factor: true,
            ..fast_policy()
        };
        manager.create(&path, "alice", ADMIN_PW, policy).unwrap();
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.close().unwrap();

        let session = manager.open(&path, "bob", "bob-temp-pass").unwrap();
        assert!(session.second_factor_enrollment_required);
        manager.change_password("bob", "bob-temp-pass", "bob-real-pass").unwrap();
        manager.enroll_second_factor("bob-real-pass").unwrap();
        assert!(!manager.session().unwrap().second_factor_enrollment_required);
        manager.close().unwrap();

        let bare = VaultManager::new(VaultConfig::default());
        assert!(matches!(
            bare.open(&path, "bob", "bob-real-pass"),
            Err(VaultError::SecondFactorUnavailable)
        ));
        let session = manager.open(&path, "bob", "bob-real-pass").unwrap();
        assert!(!session.second_factor_enrollment_required);
    }

    #[test]
    fn test_operations_require_open_vault() {
        let manager = VaultManager::new(VaultConfig::default());
        assert!(matches!(manager.save(), Err(VaultError::VaultNotOpen)));
        assert!(matches!(manager.records(), Err(VaultError::VaultNotOpen)));
        assert!(matches!(manager.close(), Err(VaultError::VaultNotOpen)));
    }

    #[test]
    fn test_failed_verification_leaves_disk_and_memory_unchanged() {
        let (dir, path, manager) = setup();
        let committed = std::fs::read(&path).unwrap();

        // The cached payload stays sealed under the original key, so the
        // staged file no longer decrypts with the swapped one
        let original_dek = {
            let mut guard = manager.lock_state().unwrap();
            let state = guard.as_mut().unwrap();
            std::mem::replace(&mut state.dek, generate_data_key().unwrap())
        };
        let result = manager.add_user("bob", "bob-temporary-1", UserRole::Standard);
        assert!(matches!(result, Err(VaultError::CorruptedFile(_))));
        assert_eq!(std::fs::read(&path).unwrap(), committed);
        assert_eq!(manager.list_users().unwrap().len(), 1);
        let staged_left = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().ends_with(".tmp"));
        assert!(!staged_left);

        manager.lock_state().unwrap().as_mut().unwrap().dek = original_dek;
        manager.close().unwrap();
        manager.open(&path, "alice", ADMIN_PW).unwrap();
        assert_eq!(manager.list_users().unwrap().len(), 1);
        manager
            .add_user("bob", "bob-temporary-1", UserRole::Standard)
            .unwrap();
        assert_eq!(manager.list_users().unwrap().len(), 2);
    }

    #[test]
    fn test_inspect_reports_header() {
        let (_dir, path, manager) = setup();
        manager.add_user("bob", "bob-temp-pass", UserRole::Standard).unwrap();
        manager.close().unwrap();

        let info = VaultManager::inspect(&path).unwrap();
        assert_eq!(info.version, VERSION_V2);
        assert_eq!(info.kdf_iterations, 1000);
        assert_eq!(info.header_redundancy, Some(20));
        assert_eq!(info.payload_redundancy, Some(10));
        assert_eq!(info.active_slots, 2);
    }

    #[test]
    fn test_v1_file_requires_upgrade() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("old.vault");
        let legacy = VaultFileV1::seal("legacy-password", b"{}", 1000, None).unwrap();
        std::fs::write(&path, legacy.to_bytes().unwrap()).unwrap();

        let manager = VaultManager::new(VaultConfig::default());
        assert!(matches!(
            manager.open(&path, "alice", "legacy-password"),
            Err(VaultError::UnsupportedVersion(1))
        ));
        assert_eq!(VaultManager::inspect(&path).unwrap().version, VERSION_V1);
    }

    #[test]
    fn test_upgrade_rejects_short_admin_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("old.vault");
        let legacy = VaultFileV1::seal("legacy-password", b"{}", 1000, None).unwrap();
        std::fs::write(&path, legacy.to_bytes().unwrap()).unwrap();

        let manager = VaultManager::new(VaultConfig::default());
        let result =
            manager.migrate_v1_to_v2(&path, "legacy-password", "al", ADMIN_PW, fast_policy());
        assert!(matches!(result, Err(VaultError::InvalidUsername(_))));
        assert!(!v1_backup_path(&path).exists());
    }

    #[test]
    fn test_v1_backup_path() {
        assert_eq!(
            v1_backup_path(Path::new("/tmp/a.vault")),
            PathBuf::from("/tmp/a.vault.v1.backup")
        );
    }
}
