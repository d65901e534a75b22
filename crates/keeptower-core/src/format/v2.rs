//! V2 multi-user file layout.
//!
//! ```text
//! magic(4) version(4) kdf_iterations(4) header_size(4)     little-endian
//! header_flags(1)                                          bit0 header FEC, bit1 payload FEC
//! header section                                           header_size - 1 bytes
//! data_salt(32) data_nonce(12)
//! payload section                                          rest of file
//! ```
//!
//! A FEC section is `[redundancy(1)][original size(4 BE)][coded bytes]`;
//! without FEC the section is the raw bytes. The header is always coded at
//! `max(20%, payload redundancy)` and records the payload preference.

use tracing::debug;

use crate::bytes::ByteReader;
use crate::crypto::{NONCE_SIZE, TAG_SIZE};
use crate::error::{Result, VaultError};
use crate::fec::validate_redundancy;
use crate::keyslot::VaultHeaderV2;

use super::{
    decode_fec_section, encode_fec_section, header_redundancy, MAX_HEADER_SIZE, MAX_PAYLOAD_SIZE,
    MIN_HEADER_REDUNDANCY, SALT_SIZE, VAULT_MAGIC, VERSION_V2,
};

pub const HEADER_FLAG_FEC: u8 = 0x01;
pub const PAYLOAD_FLAG_FEC: u8 = 0x02;
const KNOWN_FLAGS: u8 = HEADER_FLAG_FEC | PAYLOAD_FLAG_FEC;

/// Length of the magic/version/iterations/header-size prologue.
pub const PROLOGUE_SIZE: usize = 16;

/// Everything in a V2 file except the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2FileHeader {
    /// Informational; each slot's KEK uses the policy's parameters
    pub kdf_iterations: u32,
    pub header_fec: bool,
    pub payload_fec: bool,
    /// Payload FEC preference; persisted only when some section is coded
    pub fec_redundancy: u8,
    pub vault_header: VaultHeaderV2,
    pub data_salt: [u8; SALT_SIZE],
    pub data_nonce: [u8; NONCE_SIZE],
}

impl V2FileHeader {
    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.header_fec {
            flags |= HEADER_FLAG_FEC;
        }
        if self.payload_fec {
            flags |= PAYLOAD_FLAG_FEC;
        }
        flags
    }
}

/// Byte ranges of a written file, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2Layout {
    /// Start and end of the header section (after the flags byte)
    pub header_section: (usize, usize),
    /// Start of the data salt
    pub data_salt_offset: usize,
    /// Start and end of the payload section
    pub payload_section: (usize, usize),
}

/// Serialize the prologue, flags, header section, salt and nonce.
///
/// # Errors
///
/// `InvalidData` for a payload redundancy outside 5..=50 (other than
/// 0), `FecEncodingFailed` if the codec fails.
pub fn write_header(header: &V2FileHeader) -> Result<Vec<u8>> {
    if header.payload_fec || header.fec_redundancy != 0 {
        validate_redundancy(header.fec_redundancy)?;
    }

    let vault_header = header.vault_header.serialize()?;
    let section = if header.header_fec {
        encode_fec_section(
            &vault_header,
            header_redundancy(header.fec_redundancy),
            header.fec_redundancy,
        )?
    } else {
        vault_header
    };

    let header_size = u32::try_from(section.len() + 1)
        .ok()
        .filter(|size| *size as usize <= MAX_HEADER_SIZE)
        .ok_or_else(|| VaultError::InvalidData("vault header too large".to_string()))?;

    let mut out = Vec::with_capacity(PROLOGUE_SIZE + header_size as usize + SALT_SIZE + NONCE_SIZE);
    out.extend_from_slice(&VAULT_MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION_V2.to_le_bytes());
    out.extend_from_slice(&header.kdf_iterations.to_le_bytes());
    out.extend_from_slice(&header_size.to_le_bytes());
    out.push(header.flags());
    out.extend_from_slice(&section);
    out.extend_from_slice(&header.data_salt);
    out.extend_from_slice(&header.data_nonce);

    debug!(
        header_size,
        header_fec = header.header_fec,
        slots = header.vault_header.key_slots.len(),
        "v2 header written"
    );
    Ok(out)
}

/// Parse the header, returning it with the offset of the payload section.
///
/// # Errors
///
/// `CorruptedFile` for a bad prologue, out-of-range sizes or an
/// unparseable header, `UnsupportedVersion` for a non-V2 file and
/// `FecDecodingFailed` when the header cannot be recovered.
pub fn read_header(bytes: &[u8]) -> Result<(V2FileHeader, usize)> {
    let (header, layout) = read_header_with_layout(bytes)?;
    Ok((header, layout.payload_section.0))
}

fn read_header_with_layout(bytes: &[u8]) -> Result<(V2FileHeader, V2Layout)> {
    if bytes.len() < PROLOGUE_SIZE {
        return Err(VaultError::CorruptedFile("file too short for V2 prologue".to_string()));
    }
    let mut reader = ByteReader::new(bytes);
    let magic = reader.u32_le()?;
    if magic != VAULT_MAGIC {
        return Err(VaultError::CorruptedFile(format!("bad magic 0x{:08X}", magic)));
    }
    let version = reader.u32_le()?;
    if version != VERSION_V2 {
        return Err(VaultError::UnsupportedVersion(version));
    }
    let kdf_iterations = reader.u32_le()?;
    let header_size = reader.u32_le()? as usize;

    if header_size == 0 || header_size > MAX_HEADER_SIZE || header_size > reader.remaining() {
        return Err(VaultError::CorruptedFile(format!(
            "invalid header size {}",
            header_size
        )));
    }
    let flags = reader.u8()?;
    if flags & !KNOWN_FLAGS != 0 {
        return Err(VaultError::CorruptedFile(format!("unknown header flags 0x{:02x}", flags)));
    }
    let header_fec = flags & HEADER_FLAG_FEC != 0;
    let payload_fec = flags & PAYLOAD_FLAG_FEC != 0;

    let section_start = reader.offset();
    let section = reader.take(header_size - 1)?;
    let section_end = reader.offset();

    let (vault_header_bytes, stored_redundancy) = if header_fec {
        decode_fec_section(section, MIN_HEADER_REDUNDANCY, MAX_HEADER_SIZE)?
    } else {
        (section.to_vec(), 0)
    };

    let (vault_header, consumed) = VaultHeaderV2::deserialize(&vault_header_bytes)
        .map_err(|e| VaultError::CorruptedFile(format!("vault header unreadable: {}", e)))?;
    if consumed != vault_header_bytes.len() {
        return Err(VaultError::CorruptedFile(
            "trailing bytes after vault header".to_string(),
        ));
    }

    let data_salt_offset = reader.offset();
    let (data_salt, data_nonce) = match (reader.array::<SALT_SIZE>(), reader.array::<NONCE_SIZE>()) {
        (Ok(salt), Ok(nonce)) => (salt, nonce),
        _ => return Err(VaultError::CorruptedFile("file too short for data salt and nonce".to_string())),
    };
    let payload_start = reader.offset();

    // Without header FEC the payload section carries its own redundancy byte
    let fec_redundancy = match (payload_fec, header_fec) {
        (false, _) => 0,
        (true, true) => stored_redundancy,
        (true, false) => bytes.get(payload_start).copied().unwrap_or(0),
    };

    let header = V2FileHeader {
        kdf_iterations,
        header_fec,
        payload_fec,
        fec_redundancy,
        vault_header,
        data_salt,
        data_nonce,
    };
    let layout = V2Layout {
        header_section: (section_start, section_end),
        data_salt_offset,
        payload_section: (payload_start, bytes.len()),
    };
    Ok((header, layout))
}

/// Serialize a complete V2 file.
pub fn write_vault(header: &V2FileHeader, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut out = write_header(header)?;
    if header.payload_fec {
        out.extend(encode_fec_section(
            ciphertext,
            header.fec_redundancy,
            header.fec_redundancy,
        )?);
    } else {
        out.extend_from_slice(ciphertext);
    }
    Ok(out)
}

/// Parse a complete V2 file into its header and ciphertext (tag appended).
///
/// FEC success is not trusted on its own: callers must still authenticate
/// the ciphertext.
pub fn read_vault(bytes: &[u8]) -> Result<(V2FileHeader, Vec<u8>)> {
    let (mut header, layout) = read_header_with_layout(bytes)?;
    let section = &bytes[layout.payload_section.0..layout.payload_section.1];

    let ciphertext = if header.payload_fec {
        let (ciphertext, stored) = decode_fec_section(section, 0, MAX_PAYLOAD_SIZE)?;
        header.fec_redundancy = stored;
        ciphertext
    } else {
        if section.len() >= MAX_PAYLOAD_SIZE {
            return Err(VaultError::CorruptedFile("payload too large".to_string()));
        }
        section.to_vec()
    };

    if ciphertext.len() < TAG_SIZE {
        return Err(VaultError::CorruptedFile("payload too short".to_string()));
    }
    Ok((header, ciphertext))
}

/// Locate the sections of a V2 file without decoding the payload.
pub fn layout(bytes: &[u8]) -> Result<V2Layout> {
    read_header_with_layout(bytes).map(|(_, layout)| layout)
}
