use std::path::Path;

use tempfile::TempDir;

use keeptower_core::format::v2::{layout, read_vault, write_vault};
use keeptower_core::fs::{list_backups, temp_path_for};
use keeptower_core::{
    AccountRecord, KekAlgorithm, UserRole, VaultConfig, VaultError, VaultManager,
    VaultSecurityPolicy,
};

const ALICE_PW: &str = "alice-password-1";
const BOB_TEMP_PW: &str = "bob-temporary-1";

/// Redundancy byte plus big-endian size ahead of each coded section.
const SECTION_PREFIX: usize = 5;

fn fast_policy() -> VaultSecurityPolicy {
    VaultSecurityPolicy {
        kdf_iterations: 1000,
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        min_password_length: 8,
        ..VaultSecurityPolicy::default()
    }
}

fn team_vault(path: &Path, config: VaultConfig) -> VaultManager {
    let manager = VaultManager::new(config);
    manager
        .create(path, "alice", ALICE_PW, fast_policy())
        .expect("create should succeed");
    manager
        .add_user("bob", BOB_TEMP_PW, UserRole::Standard)
        .expect("add_user should succeed");
    let mut record = AccountRecord::new("VPN");
    record.password = "tunnel-secret".to_string();
    manager.add_record(record).expect("add_record should succeed");
    manager.close().expect("close should succeed");
    manager
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("dir should be listable")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn flip(bytes: &mut [u8], offset: usize) {
    bytes[offset] ^= 0xA5;
}

/// Damage inside the FEC-coded header and payload sections is repaired.
///
/// The prologue, flags byte, section length prefixes and nonce are not
/// coded; damage there is covered by
/// `test_uncoded_prologue_damage_is_reported_as_corruption`.
#[test]
fn test_corrupted_bytes_are_repaired_on_open() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());

    let mut bytes = std::fs::read(&path).expect("vault should be readable");
    let sections = layout(&bytes).expect("layout should parse");
    let header_coded = sections.header_section.0 + SECTION_PREFIX;
    let payload_coded = sections.payload_section.0 + SECTION_PREFIX;
    flip(&mut bytes, header_coded + 40);
    flip(&mut bytes, payload_coded + 3);
    flip(&mut bytes, sections.payload_section.1 - 2);
    std::fs::write(&path, &bytes).expect("corrupted vault should be written");

    manager
        .open(&path, "bob", BOB_TEMP_PW)
        .expect("bob should open the repaired vault");
    manager
        .change_password("bob", BOB_TEMP_PW, "bob-password-22")
        .expect("password change should succeed");
    let records = manager.records().expect("records should be readable");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].account_name, "VPN");
    assert_eq!(records[0].password, "tunnel-secret");
    manager.close().expect("close should succeed");

    let rewritten = std::fs::read(&path).expect("vault should be readable");
    let fresh = layout(&rewritten).expect("layout should parse");
    assert_eq!(fresh.payload_section.0, sections.payload_section.0);
}

#[test]
fn test_uncoded_prologue_damage_is_reported_as_corruption() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());
    let committed = std::fs::read(&path).expect("vault should be readable");

    // magic, high byte of the header size, flags
    for offset in [0, 15, 16] {
        let mut bytes = committed.clone();
        flip(&mut bytes, offset);
        std::fs::write(&path, &bytes).expect("damaged vault should be written");
        let err = manager
            .open(&path, "alice", ALICE_PW)
            .expect_err("open should fail");
        assert!(err.is_corruption(), "offset {}: unexpected error: {}", offset, err);
    }

    let mut bytes = committed.clone();
    flip(&mut bytes, 4);
    std::fs::write(&path, &bytes).expect("damaged vault should be written");
    assert!(matches!(
        manager.open(&path, "alice", ALICE_PW),
        Err(VaultError::UnsupportedVersion(_))
    ));
    assert!(!manager.is_open());
}

#[test]
fn test_out_of_range_kdf_parameters_are_rejected_before_unlock() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());
    let committed = std::fs::read(&path).expect("vault should be readable");
    let (header, ciphertext) = read_vault(&committed).expect("vault should parse");

    let tampered: [fn(&mut VaultSecurityPolicy); 4] = [
        |p| p.argon2_memory_kib = u32::MAX,
        |p| p.argon2_iterations = u32::MAX,
        |p| p.argon2_parallelism = 0,
        |p| p.kdf_iterations = u32::MAX,
    ];
    for (case, tamper) in tampered.iter().enumerate() {
        let mut crafted = header.clone();
        tamper(&mut crafted.vault_header.security_policy);
        crafted.vault_header.security_policy.kek_algorithm = KekAlgorithm::Argon2id;
        let bytes = write_vault(&crafted, &ciphertext).expect("crafted vault should serialize");
        std::fs::write(&path, &bytes).expect("crafted vault should be written");

        let err = manager
            .open(&path, "alice", ALICE_PW)
            .expect_err("open should fail");
        assert!(
            matches!(err, VaultError::CorruptedFile(_)),
            "case {}: unexpected error: {}",
            case,
            err
        );
    }

    std::fs::write(&path, &committed).expect("vault should be restored");
    manager
        .open(&path, "alice", ALICE_PW)
        .expect("untampered vault should open");
}

#[test]
fn test_payload_damage_beyond_capacity_is_reported_as_corruption() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());

    let mut bytes = std::fs::read(&path).expect("vault should be readable");
    let sections = layout(&bytes).expect("layout should parse");
    let start = sections.payload_section.0 + SECTION_PREFIX;
    for offset in start..start + 120 {
        flip(&mut bytes, offset);
    }
    std::fs::write(&path, &bytes).expect("corrupted vault should be written");

    let err = manager
        .open(&path, "alice", ALICE_PW)
        .expect_err("open should fail");
    assert!(err.is_corruption(), "unexpected error: {}", err);
    assert!(!matches!(err, VaultError::AuthenticationFailed));
}

#[test]
fn test_unprotected_payload_fails_authentication_when_tampered() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let config = VaultConfig {
        fec_redundancy: 0,
        ..VaultConfig::default()
    };
    let manager = team_vault(&path, config);

    let mut bytes = std::fs::read(&path).expect("vault should be readable");
    let sections = layout(&bytes).expect("layout should parse");
    flip(&mut bytes, sections.payload_section.0 + 4);
    std::fs::write(&path, &bytes).expect("tampered vault should be written");

    assert!(matches!(
        manager.open(&path, "alice", ALICE_PW),
        Err(VaultError::AuthenticationFailed)
    ));
}

#[test]
fn test_interrupted_write_leaves_previous_vault() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());
    let committed = std::fs::read(&path).expect("vault should be readable");

    // A crash after staging but before the rename leaves only a temp file
    let stray = temp_path_for(&path).expect("temp path");
    std::fs::write(&stray, &committed[..committed.len() / 2]).expect("stray write");

    assert_eq!(std::fs::read(&path).expect("vault should be readable"), committed);
    manager
        .open(&path, "alice", ALICE_PW)
        .expect("the committed vault should still open");
    manager
        .add_record(AccountRecord::new("After crash"))
        .expect("add should succeed");
    manager.save().expect("save should succeed despite the stray file");
    manager.close().expect("close should succeed");

    manager
        .open(&path, "alice", ALICE_PW)
        .expect("reopen should succeed");
    assert_eq!(manager.records().expect("records").len(), 2);
}

#[cfg(unix)]
#[test]
fn test_write_refused_by_directory_keeps_previous_vault() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("temp dir should be created");
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).expect("dir should be created");
    let path = nested.join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());
    let committed = std::fs::read(&path).expect("vault should be readable");

    manager
        .open(&path, "alice", ALICE_PW)
        .expect("open should succeed");
    manager
        .add_record(AccountRecord::new("Pending"))
        .expect("add should succeed");
    let entries_before = entries(&nested);

    let set_mode = |mode: u32| {
        std::fs::set_permissions(&nested, std::fs::Permissions::from_mode(mode))
            .expect("permissions should change");
    };
    set_mode(0o555);
    // Privileged users bypass directory permissions
    let canary = nested.join("canary");
    if std::fs::write(&canary, b"x").is_ok() {
        let _ = std::fs::remove_file(&canary);
        set_mode(0o755);
        return;
    }

    let result = manager.save();
    let entries_after = entries(&nested);
    set_mode(0o755);

    assert!(
        matches!(result, Err(VaultError::FileWriteFailed(_))),
        "unexpected result: {:?}",
        result
    );
    assert_eq!(entries_after, entries_before);
    assert_eq!(std::fs::read(&path).expect("vault should be readable"), committed);
    assert!(manager.is_open());

    manager.save().expect("save should succeed once writable");
    manager.close().expect("close should succeed");
    manager
        .open(&path, "alice", ALICE_PW)
        .expect("reopen should succeed");
    let names: Vec<String> = manager
        .records()
        .expect("records")
        .into_iter()
        .map(|record| record.account_name)
        .collect();
    assert_eq!(names, vec!["VPN", "Pending"]);
}

#[test]
fn test_failed_write_keeps_vault_open_and_file_intact() {
    let dir = TempDir::new().expect("temp dir should be created");
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).expect("dir should be created");
    let path = nested.join("team.vault");
    let manager = team_vault(&path, VaultConfig::default());

    manager
        .open(&path, "alice", ALICE_PW)
        .expect("open should succeed");
    manager
        .add_record(AccountRecord::new("Unsaved"))
        .expect("add should succeed");
    std::fs::remove_dir_all(&nested).expect("dir should be removed");

    assert!(manager.save().is_err());
    assert!(manager.close().is_err());
    assert!(manager.is_open());
    assert!(!path.exists());
}

#[test]
fn test_backups_rotate_and_restore() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let config = VaultConfig {
        max_backups: 2,
        ..VaultConfig::default()
    };
    let manager = VaultManager::new(config);
    manager
        .create(&path, "alice", ALICE_PW, fast_policy())
        .expect("create should succeed");
    assert!(list_backups(&path).expect("list").is_empty());
    assert!(matches!(
        manager.restore_from_backup(&path),
        Err(VaultError::VaultAlreadyOpen)
    ));

    for i in 0..4 {
        manager
            .add_record(AccountRecord::new(format!("record {}", i)))
            .expect("add should succeed");
        manager.save().expect("save should succeed");
    }
    manager.close().expect("close should succeed");

    let backups = VaultManager::list_backups(&path).expect("list should succeed");
    assert_eq!(backups.len(), 2);
    assert!(backups[0] > backups[1], "backups should be newest first");

    let restored = manager
        .restore_from_backup(&path)
        .expect("restore should succeed");
    assert_eq!(restored, VaultManager::list_backups(&path).expect("list")[0]);

    manager
        .open(&path, "alice", ALICE_PW)
        .expect("restored vault should open");
    let names: Vec<String> = manager
        .records()
        .expect("records")
        .into_iter()
        .map(|record| record.account_name)
        .collect();
    assert_eq!(names, vec!["record 0", "record 1", "record 2"]);
}

#[test]
fn test_backups_can_be_disabled() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("team.vault");
    let config = VaultConfig {
        backups_enabled: false,
        ..VaultConfig::default()
    };
    team_vault(&path, config);
    assert!(list_backups(&path).expect("list").is_empty());
}
