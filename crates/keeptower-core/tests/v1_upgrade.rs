use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use keeptower_core::format::v1::VaultFileV1;
use keeptower_core::format::{detect_version, VERSION_V2};
use keeptower_core::vault::v1_backup_path;
use keeptower_core::{
    AccountRecord, UserRole, VaultConfig, VaultData, VaultError, VaultManager,
    VaultSecurityPolicy,
};

const LEGACY_PW: &str = "legacy-password-1";
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

fn write_legacy_vault(path: &Path, fec_redundancy: Option<u8>) -> Vec<u8> {
    let mut data = VaultData::default();
    let mut record = AccountRecord::new("Router");
    record.password = "admin123".to_string();
    data.add(record);
    data.add(AccountRecord::new("Printer"));
    let plaintext = data.to_bytes().expect("records should serialize");

    let legacy = VaultFileV1::seal(LEGACY_PW, &plaintext, 1000, fec_redundancy)
        .expect("seal should succeed");
    let bytes = legacy.to_bytes().expect("V1 should serialize");
    std::fs::write(path, &bytes).expect("V1 file should be written");
    bytes
}

#[test]
fn test_upgrade_keeps_records_and_backup() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("legacy.vault");
    let original = write_legacy_vault(&path, None);

    let manager = VaultManager::new(VaultConfig::default());
    let session = manager
        .migrate_v1_to_v2(&path, LEGACY_PW, "admin", ADMIN_PW, fast_policy())
        .expect("upgrade should succeed");
    assert_eq!(session.role, UserRole::Administrator);
    assert!(!session.must_change_password);

    let names: Vec<String> = manager
        .records()
        .expect("records should be readable")
        .into_iter()
        .map(|record| record.account_name)
        .collect();
    assert_eq!(names, vec!["Router".to_string(), "Printer".to_string()]);
    manager.close().expect("close should succeed");

    let backup = std::fs::read(v1_backup_path(&path)).expect("V1 backup should exist");
    assert_eq!(backup, original);

    let upgraded = std::fs::read(&path).expect("vault should be readable");
    assert_eq!(detect_version(&upgraded).expect("version"), VERSION_V2);

    manager
        .open(&path, "admin", ADMIN_PW)
        .expect("upgraded vault should open");
    let router = manager
        .records()
        .expect("records should be readable")
        .into_iter()
        .find(|record| record.account_name == "Router")
        .expect("router record should survive");
    assert_eq!(router.password, "admin123");
}

#[test]
fn test_upgrade_carries_fec_setting() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("legacy-fec.vault");
    write_legacy_vault(&path, Some(25));

    let manager = VaultManager::new(VaultConfig::default());
    manager
        .migrate_v1_to_v2(&path, LEGACY_PW, "admin", ADMIN_PW, fast_policy())
        .expect("upgrade should succeed");
    manager.close().expect("close should succeed");

    let info = VaultManager::inspect(&path).expect("inspect should succeed");
    assert_eq!(info.payload_redundancy, Some(25));
    assert_eq!(info.header_redundancy, Some(25));
}

#[test]
fn test_wrong_legacy_password_leaves_file_untouched() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("legacy.vault");
    let original = write_legacy_vault(&path, None);

    let manager = VaultManager::new(VaultConfig::default());
    let result = manager.migrate_v1_to_v2(&path, "wrong-password", "admin", ADMIN_PW, fast_policy());
    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    assert!(!manager.is_open());

    assert_eq!(std::fs::read(&path).expect("file should remain"), original);
    assert!(!v1_backup_path(&path).exists());
}

#[test]
fn test_weak_admin_password_rejected_before_writing() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("legacy.vault");
    let original = write_legacy_vault(&path, None);

    let manager = VaultManager::new(VaultConfig::default());
    let result = manager.migrate_v1_to_v2(&path, LEGACY_PW, "admin", "short", fast_policy());
    assert!(matches!(result, Err(VaultError::WeakPassword(_))));
    assert_eq!(std::fs::read(&path).expect("file should remain"), original);
}

#[test]
fn test_upgrade_refuses_v2_file() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("modern.vault");
    let manager = VaultManager::new(VaultConfig::default());
    manager
        .create(&path, "admin", ADMIN_PW, fast_policy())
        .expect("create should succeed");
    manager.close().expect("close should succeed");

    let result = manager.migrate_v1_to_v2(&path, ADMIN_PW, "admin", ADMIN_PW, fast_policy());
    assert!(matches!(result, Err(VaultError::UnsupportedVersion(2))));
}

#[test]
fn test_legacy_file_still_opens_directly() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("legacy.vault");
    write_legacy_vault(&path, Some(10));

    let bytes = std::fs::read(&path).expect("vault should be readable");
    let legacy = VaultFileV1::parse(&bytes).expect("V1 should parse");
    let plaintext = legacy
        .open(LEGACY_PW, None, Duration::from_secs(1))
        .expect("V1 should decrypt");
    let data = VaultData::from_bytes(&plaintext).expect("records should parse");
    assert_eq!(data.accounts.len(), 2);
}
