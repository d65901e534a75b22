//! On-disk vault formats.
//!
//! - **V1**: single-user, password-encrypted payload (read-only; upgraded
//!   through the orchestrator)
//! - **V2**: multi-user key-slot header, separately FEC-protected header and
//!   payload
//!
//! All fixed-width file prologue fields are little-endian; structures
//! inside the header and the FEC framing are big-endian.

pub mod v1;
pub mod v2;

use tracing::debug;

use crate::bytes::ByteReader;
use crate::error::{Result, VaultError};
use crate::fec::{validate_redundancy, EncodedData, FecCodec, MAX_REDUNDANCY};

/// "KPTW" read as a little-endian u32.
pub const VAULT_MAGIC: u32 = 0x4B50_5457;
pub const VERSION_V1: u32 = 1;
pub const VERSION_V2: u32 = 2;

/// Largest header section the parser accepts.
pub const MAX_HEADER_SIZE: usize = 1024 * 1024;

/// Payloads at or above this original size are treated as corruption.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024 * 1024;

/// Floor for header FEC redundancy regardless of the payload setting.
pub const MIN_HEADER_REDUNDANCY: u8 = 20;

/// Salt length in file prologues.
pub const SALT_SIZE: usize = 32;

/// Length of the `[redundancy][original size]` prefix of a FEC section.
pub(crate) const FEC_SECTION_PREFIX: usize = 5;

/// Redundancy the header is encoded with for a given payload setting.
pub fn header_redundancy(requested: u8) -> u8 {
    requested.max(MIN_HEADER_REDUNDANCY)
}

/// Sniff the format version from the file prologue.
///
/// # Errors
///
/// `CorruptedFile` if the buffer is too short or lacks the magic,
/// `UnsupportedVersion` for any version other than 1 or 2.
pub fn detect_version(bytes: &[u8]) -> Result<u32> {
    let mut reader = ByteReader::new(bytes);
    let (magic, version) = match (reader.u32_le(), reader.u32_le()) {
        (Ok(magic), Ok(version)) => (magic, version),
        _ => return Err(VaultError::CorruptedFile("file too short".to_string())),
    };
    if magic != VAULT_MAGIC {
        return Err(VaultError::CorruptedFile(format!("bad magic 0x{:08X}", magic)));
    }
    match version {
        VERSION_V1 | VERSION_V2 => Ok(version),
        other => Err(VaultError::UnsupportedVersion(other)),
    }
}

/// Whether `bytes` starts with a V2 prologue.
pub fn is_valid_v2_vault(bytes: &[u8]) -> bool {
    matches!(detect_version(bytes), Ok(VERSION_V2))
}

/// Frame `data` as `[stored redundancy][original size BE][coded bytes]`.
///
/// `encode_redundancy` is what the codec uses; `stored_redundancy` is what
/// gets recorded (the header stores the payload preference).
pub(crate) fn encode_fec_section(
    data: &[u8],
    encode_redundancy: u8,
    stored_redundancy: u8,
) -> Result<Vec<u8>> {
    let original_size = u32::try_from(data.len())
        .map_err(|_| VaultError::InvalidData(format!("section too large: {} bytes", data.len())))?;
    let encoded = FecCodec::new(encode_redundancy)
        .and_then(|codec| codec.encode(data))
        .map_err(|e| VaultError::FecEncodingFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(FEC_SECTION_PREFIX + encoded.data.len());
    out.push(stored_redundancy);
    out.extend_from_slice(&original_size.to_be_bytes());
    out.extend_from_slice(&encoded.data);
    Ok(out)
}

/// Recover a section written by [`encode_fec_section`].
///
/// Returns the data and the stored redundancy byte. The codec runs at
/// `max(stored, floor)`.
pub(crate) fn decode_fec_section(section: &[u8], floor: u8, max_size: usize) -> Result<(Vec<u8>, u8)> {
    let mut reader = ByteReader::new(section);
    let (stored, original_size) = match (reader.u8(), reader.u32_be()) {
        (Ok(stored), Ok(size)) => (stored, size as usize),
        _ => return Err(VaultError::CorruptedFile("FEC section too small".to_string())),
    };

    if stored > MAX_REDUNDANCY {
        return Err(VaultError::CorruptedFile(format!(
            "stored FEC redundancy {}% out of range",
            stored
        )));
    }
    let redundancy = stored.max(floor);
    validate_redundancy(redundancy).map_err(|e| VaultError::CorruptedFile(e.to_string()))?;

    if original_size == 0 || original_size >= max_size {
        return Err(VaultError::CorruptedFile(format!(
            "implausible FEC original size {}",
            original_size
        )));
    }

    let encoded = EncodedData::from_stored(reader.rest().to_vec(), original_size, redundancy)
        .map_err(|e| VaultError::CorruptedFile(e.to_string()))?;
    let decoded = FecCodec::new(redundancy)?
        .decode(&encoded)
        .map_err(|e| VaultError::FecDecodingFailed(e.to_string()))?;

    debug!(redundancy, original_size, "fec section recovered");
    Ok((decoded, stored))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prologue(magic: u32, version: u32) -> Vec<u8> {
        let mut bytes = magic.to_le_bytes().to_vec();
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes
    }

    #[test]
    fn test_detect_version() {
        assert_eq!(detect_version(&prologue(VAULT_MAGIC, 1)).unwrap(), 1);
        assert_eq!(detect_version(&prologue(VAULT_MAGIC, 2)).unwrap(), 2);
        assert!(matches!(
            detect_version(&prologue(VAULT_MAGIC, 3)),
            Err(VaultError::UnsupportedVersion(3))
        ));
        assert!(matches!(
            detect_version(&prologue(0xDEADBEEF, 2)),
            Err(VaultError::CorruptedFile(_))
        ));
        assert!(matches!(detect_version(&[0x57, 0x54]), Err(VaultError::CorruptedFile(_))));
    }

    #[test]
    fn test_magic_bytes_on_disk() {
        assert_eq!(&prologue(VAULT_MAGIC, 2)[..4], b"WTPK");
        assert!(is_valid_v2_vault(&prologue(VAULT_MAGIC, 2)));
        assert!(!is_valid_v2_vault(&prologue(VAULT_MAGIC, 1)));
    }

    #[test]
    fn test_header_redundancy_floor() {
        assert_eq!(header_redundancy(0), 20);
        assert_eq!(header_redundancy(10), 20);
        assert_eq!(header_redundancy(20), 20);
        assert_eq!(header_redundancy(35), 35);
    }

    #[test]
    fn test_fec_section_round_trip() {
        let data: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let section = encode_fec_section(&data, 20, 10).unwrap();
        assert_eq!(section[0], 10);
        assert_eq!(&section[1..5], &500u32.to_be_bytes());

        let (decoded, stored) = decode_fec_section(&section, MIN_HEADER_REDUNDANCY, MAX_HEADER_SIZE).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(stored, 10);
    }

    #[test]
    fn test_fec_section_rejects_absurd_size() {
        let mut section = encode_fec_section(b"abc", 10, 10).unwrap();
        section[1..5].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decode_fec_section(&section, 0, MAX_PAYLOAD_SIZE),
            Err(VaultError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_fec_section_rejects_bad_redundancy() {
        let mut section = encode_fec_section(b"abc", 10, 10).unwrap();
        section[0] = 51;
        assert!(decode_fec_section(&section, 0, MAX_PAYLOAD_SIZE).is_err());
        section[0] = 3;
        assert!(decode_fec_section(&section, 0, MAX_PAYLOAD_SIZE).is_err());
    }
}
