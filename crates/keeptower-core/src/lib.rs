//! # KeepTower Core
//!
//! Core library for KeepTower - a multi-user encrypted credential vault with
//! LUKS-style key slots and Reed-Solomon protected storage.
//!
//! This crate provides the vault file format, key hierarchy and session
//! lifecycle independent of any user interface.
//!
//! ## Architecture
//!
//! - **fec**: Reed-Solomon encode/decode over fixed-size blocks
//! - **keyslot**: Binary model of the security policy, key slots and V2 header
//! - **crypto**: Data keys, password KDFs, key wrapping and payload encryption
//! - **format**: V1 and V2 file layouts
//! - **auth**: Slot lookup, password verification and username migration
//! - **vault**: The open/modify/save/close orchestrator
//! - **records**: The plaintext record store carried in the payload

pub mod auth;
pub mod bytes;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fec;
pub mod format;
pub mod fs;
pub mod keyslot;
pub mod records;
pub mod second_factor;
pub mod vault;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use keyslot::{
    KekAlgorithm, KeySlot, MigrationStatus, UserRole, UsernameHashAlgorithm, VaultHeaderV2,
    VaultSecurityPolicy,
};
pub use records::{AccountGroup, AccountRecord, VaultData};
pub use second_factor::SecondFactor;
pub use vault::{Session, UserInfo, VaultInfo, VaultManager};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
