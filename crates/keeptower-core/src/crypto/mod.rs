//! Key hierarchy for KeepTower vaults.
//!
//! A single random data key (DEK) encrypts the record store. Every user
//! slot holds its own copy of the DEK, wrapped with a key-encryption key
//! (KEK) derived from that user's password:
//! - **PBKDF2-HMAC-SHA256** or **Argon2id** derive the KEK
//! - **AES-256 key wrap** (RFC 3394) protects the DEK; a failed unwrap is
//!   the password check, no password verifier is stored
//! - **AES-256-GCM** encrypts the payload with a fresh nonce per save
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the vault file
//! - Offline brute-force attacks on passwords
//! - Username enumeration from the file (hashed usernames)
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked session / process memory

pub mod aead;
pub mod kdf;
pub mod key;
pub mod passphrase;
pub mod username;
pub mod wrap;

pub use aead::{decrypt_payload, encrypt_payload, EncryptedPayload, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_kek, derive_key, derive_key_argon2};
pub use key::{generate_data_key, random_bytes, DataKey, KeyEncryptionKey, KEY_SIZE};
pub use passphrase::validate_password;
pub use username::{hash_username, verify_username};
pub use wrap::{combine_with_second_factor, unwrap_key, wrap_key};
