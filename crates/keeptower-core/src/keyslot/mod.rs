//! LUKS-style key-slot data model.
//!
//! Pure binary (de)serialization of the security policy, the per-user key
//! slots and the V2 header that groups them. Nothing here performs I/O or
//! cryptography; every read is bounds-checked against the supplied buffer.

pub mod header;
pub mod policy;
pub mod slot;
pub mod types;

pub use header::{VaultHeaderV2, MAX_KEY_SLOTS};
pub use policy::{
    VaultSecurityPolicy, CHALLENGE_SIZE, DEFAULT_KDF_ITERATIONS, MAX_ARGON2_ITERATIONS,
    MAX_ARGON2_MEMORY_KIB, MAX_KDF_ITERATIONS, MIGRATION_FLAG_ACTIVE, MIN_KDF_ITERATIONS,
    POLICY_SERIALIZED_SIZE,
};
pub use slot::{
    KeySlot, KEK_SALT_SIZE, KEYSLOT_MIN_SIZE, MAX_USERNAME_LEN, USERNAME_SALT_SIZE,
    WRAPPED_KEY_SIZE,
};
pub use types::{
    unix_timestamp, KekAlgorithm, MigrationStatus, SecondFactorAlgorithm, UserRole,
    UsernameHashAlgorithm,
};
