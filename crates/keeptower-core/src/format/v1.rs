//! Legacy single-user V1 layout.
//!
//! ```text
//! [magic(4) version=1(4) iterations(4)]        optional prelude, little-endian
//! salt(32) nonce(12)
//! [flags(1)]                                   prelude files only
//! [serial_len(1) serial challenge(64)]         flags bit1
//! [redundancy(1) original_size(4 BE)] data     flags bit0, else raw ciphertext
//! ```
//!
//! Files without the prelude are decrypted with 100 000 PBKDF2 iterations.
//! V1 vaults are only read (and written for compatibility fixtures); the
//! orchestrator upgrades them to V2.

use std::time::Duration;

use zeroize::{Zeroize, Zeroizing};

use crate::bytes::ByteReader;
use crate::crypto::{
    combine_with_second_factor, decrypt_payload, derive_key, encrypt_payload, random_bytes,
    NONCE_SIZE, TAG_SIZE,
};
use crate::error::{Result, VaultError};
use crate::keyslot::{CHALLENGE_SIZE, MAX_KDF_ITERATIONS, MIN_KDF_ITERATIONS};
use crate::second_factor::SecondFactor;

use super::{
    decode_fec_section, encode_fec_section, MAX_PAYLOAD_SIZE, SALT_SIZE, VAULT_MAGIC, VERSION_V1,
};

pub const FLAG_FEC: u8 = 0x01;
pub const FLAG_SECOND_FACTOR: u8 = 0x02;
const KNOWN_FLAGS: u8 = FLAG_FEC | FLAG_SECOND_FACTOR;

/// Iterations assumed for files without a prelude.
pub const LEGACY_ITERATIONS: u32 = 100_000;

/// Second-factor binding stored in a V1 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1SecondFactor {
    pub serial: String,
    pub challenge: [u8; CHALLENGE_SIZE],
}

/// A parsed V1 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFileV1 {
    /// Whether the file carries the magic/version/iterations prelude
    pub has_prelude: bool,
    pub iterations: u32,
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    pub second_factor: Option<V1SecondFactor>,
    /// FEC redundancy of the ciphertext, if it was coded
    pub fec_redundancy: Option<u8>,
    /// AES-256-GCM ciphertext with tag appended
    pub ciphertext: Vec<u8>,
}

fn truncated() -> VaultError {
    VaultError::CorruptedFile("V1 file truncated".to_string())
}

impl VaultFileV1 {
    /// Parse a V1 file, recovering FEC-coded ciphertext.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let has_prelude = bytes.len() >= 4 && bytes[..4] == VAULT_MAGIC.to_le_bytes();

        let iterations = if has_prelude {
            reader.u32_le().map_err(|_| truncated())?;
            let version = reader.u32_le().map_err(|_| truncated())?;
            if version != VERSION_V1 {
                return Err(VaultError::UnsupportedVersion(version));
            }
            let iterations = reader.u32_le().map_err(|_| truncated())?;
            if !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&iterations) {
                return Err(VaultError::CorruptedFile(format!(
                    "V1 iteration count {} out of range",
                    iterations
                )));
            }
            iterations
        } else {
            LEGACY_ITERATIONS
        };

        let salt = reader.array::<SALT_SIZE>().map_err(|_| truncated())?;
        let nonce = reader.array::<NONCE_SIZE>().map_err(|_| truncated())?;

        let flags = if has_prelude {
            reader.u8().map_err(|_| truncated())?
        } else {
            0
        };
        if flags & !KNOWN_FLAGS != 0 {
            return Err(VaultError::CorruptedFile(format!("unknown V1 flags 0x{:02x}", flags)));
        }

        let second_factor = if flags & FLAG_SECOND_FACTOR != 0 {
            let serial_len = reader.u8().map_err(|_| truncated())? as usize;
            if serial_len == 0 {
                return Err(VaultError::CorruptedFile(
                    "empty second factor serial".to_string(),
                ));
            }
            let serial = reader.take(serial_len).map_err(|_| truncated())?;
            let challenge = reader.array::<CHALLENGE_SIZE>().map_err(|_| truncated())?;
            Some(V1SecondFactor {
                serial: String::from_utf8_lossy(serial).into_owned(),
                challenge,
            })
        } else {
            None
        };

        let rest = reader.rest();
        let (ciphertext, fec_redundancy) = if flags & FLAG_FEC != 0 {
            let (ciphertext, redundancy) = decode_fec_section(rest, 0, MAX_PAYLOAD_SIZE)?;
            (ciphertext, Some(redundancy))
        } else {
            (rest.to_vec(), None)
        };
        if ciphertext.len() < TAG_SIZE {
            return Err(VaultError::CorruptedFile("V1 payload too short".to_string()));
        }

        Ok(Self {
            has_prelude,
            iterations,
            salt,
            nonce,
            second_factor,
            fec_redundancy,
            ciphertext,
        })
    }

    /// Serialize back to the V1 layout.
    ///
    /// # Errors
    ///
    /// `InvalidData` when flags are requested on a file without a prelude,
    /// or for an empty or over-long second-factor serial.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.has_prelude {
            out.extend_from_slice(&VAULT_MAGIC.to_le_bytes());
            out.extend_from_slice(&VERSION_V1.to_le_bytes());
            out.extend_from_slice(&self.iterations.to_le_bytes());
        } else if self.second_factor.is_some() || self.fec_redundancy.is_some() {
            return Err(VaultError::InvalidData(
                "V1 files without a prelude cannot carry flags".to_string(),
            ));
        }
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);

        if self.has_prelude {
            let mut flags = 0;
            if self.fec_redundancy.is_some() {
                flags |= FLAG_FEC;
            }
            if self.second_factor.is_some() {
                flags |= FLAG_SECOND_FACTOR;
            }
            out.push(flags);
        }

        if let Some(factor) = &self.second_factor {
            let serial = factor.serial.as_bytes();
            let serial_len = u8::try_from(serial.len())
                .ok()
                .filter(|len| *len > 0)
                .ok_or_else(|| VaultError::InvalidData("invalid second factor serial".to_string()))?;
            out.push(serial_len);
            out.extend_from_slice(serial);
            out.extend_from_slice(&factor.challenge);
        }

        match self.fec_redundancy {
            Some(redundancy) => out.extend(encode_fec_section(&self.ciphertext, redundancy, redundancy)?),
            None => out.extend_from_slice(&self.ciphertext),
        }
        Ok(out)
    }

    /// Encrypt `plaintext` into a new V1 file (with prelude).
    pub fn seal(
        password: &str,
        plaintext: &[u8],
        iterations: u32,
        fec_redundancy: Option<u8>,
    ) -> Result<Self> {
        let salt = random_bytes::<SALT_SIZE>()?;
        let key = derive_key(password, &salt, iterations)?;
        let payload = encrypt_payload(key.as_bytes(), plaintext)?;
        Ok(Self {
            has_prelude: true,
            iterations,
            salt,
            nonce: payload.nonce,
            second_factor: None,
            fec_redundancy,
            ciphertext: payload.ciphertext,
        })
    }

    /// Decrypt the payload.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` for a wrong password,
    /// `SecondFactorUnavailable` when the file needs a device and none was
    /// supplied.
    pub fn open(
        &self,
        password: &str,
        device: Option<&dyn SecondFactor>,
        timeout: Duration,
    ) -> Result<Zeroizing<Vec<u8>>> {
        if password.is_empty() {
            return Err(VaultError::AuthenticationFailed);
        }
        let mut key = derive_key(password, &self.salt, self.iterations)?;
        if let Some(factor) = &self.second_factor {
            let device = device.ok_or(VaultError::SecondFactorUnavailable)?;
            let response = device.respond(&factor.challenge, timeout)?;
            key = combine_with_second_factor(&key, &response)?;
        }
        let mut key_bytes = *key.as_bytes();
        let plaintext = decrypt_payload(&key_bytes, &self.nonce, &self.ciphertext);
        key_bytes.zeroize();
        plaintext
    }
}
