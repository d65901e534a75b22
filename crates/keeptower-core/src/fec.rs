//! Reed-Solomon forward error correction.
//!
//! Input is cut into fixed 223-byte data blocks (the last one zero padded).
//! Every data block is spread across `c` interleaved Reed-Solomon codewords
//! over GF(2^8), each at most 255 bytes long and each carrying the same
//! number of parity bytes. Parity is sized so that every codeword corrects at
//! least `redundancy / 2` percent of its own bytes; at roughly 12% redundancy
//! a block is a single classic RS(255,223) codeword.
//!
//! The codec is stateless apart from its configured redundancy. Decoding
//! success does not prove integrity: a block corrupted beyond its capacity
//! may occasionally be "corrected" to the wrong codeword, so callers layer an
//! authenticated check (AEAD tag, key unwrap) on top.

use reed_solomon::{Decoder, Encoder};
use tracing::debug;

use crate::error::{Result, VaultError};

/// Data bytes per block.
pub const DATA_BLOCK_SIZE: usize = 223;

/// Longest codeword GF(2^8) Reed-Solomon supports.
pub const MAX_CODEWORD_SIZE: usize = 255;

/// Lowest accepted redundancy percentage.
pub const MIN_REDUNDANCY: u8 = 5;

/// Highest accepted redundancy percentage.
pub const MAX_REDUNDANCY: u8 = 50;

/// Layout of one coded block for a given redundancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    /// Number of interleaved codewords per data block
    pub codewords: usize,
    /// Parity bytes appended to each codeword
    pub parity_per_codeword: usize,
}

impl BlockGeometry {
    /// Compute the smallest interleave depth that fits the requested parity.
    pub fn for_redundancy(redundancy: u8) -> Result<Self> {
        validate_redundancy(redundancy)?;
        let r = redundancy as usize;

        for codewords in 1..=DATA_BLOCK_SIZE {
            let share = DATA_BLOCK_SIZE.div_ceil(codewords);
            let mut parity = (share * r).div_ceil(100 - r).max(2);
            if parity % 2 == 1 {
                parity += 1;
            }
            if share + parity <= MAX_CODEWORD_SIZE {
                return Ok(Self {
                    codewords,
                    parity_per_codeword: parity,
                });
            }
        }

        Err(VaultError::FecEncodingFailed(format!(
            "no codeword layout for {}% redundancy",
            redundancy
        )))
    }

    /// Size of one coded block in bytes.
    pub fn block_size(&self) -> usize {
        DATA_BLOCK_SIZE + self.codewords * self.parity_per_codeword
    }

    /// Number of data bytes carried by codeword `index`.
    fn data_share(&self, index: usize) -> usize {
        (DATA_BLOCK_SIZE - index).div_ceil(self.codewords)
    }

    /// Errors each codeword can correct.
    pub fn correctable_per_codeword(&self) -> usize {
        self.parity_per_codeword / 2
    }
}

/// Output of [`FecCodec::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedData {
    /// Length of the input before padding
    pub original_size: usize,
    /// Redundancy percentage the data was encoded with
    pub redundancy_percent: u8,
    /// Size of one coded block
    pub block_size: usize,
    /// Number of 223-byte data blocks
    pub data_blocks: usize,
    /// `ceil(data_blocks * redundancy / 100)`, informational
    pub parity_blocks: usize,
    /// Coded blocks, concatenated
    pub data: Vec<u8>,
}

impl EncodedData {
    /// Rebuild the metadata for coded bytes read back from storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the byte count does not match a whole number
    /// of blocks able to hold `original_size` bytes.
    pub fn from_stored(data: Vec<u8>, original_size: usize, redundancy: u8) -> Result<Self> {
        let geometry = BlockGeometry::for_redundancy(redundancy)?;
        let block_size = geometry.block_size();

        if original_size == 0 {
            return Err(VaultError::InvalidData("original size is zero".to_string()));
        }
        let data_blocks = original_size.div_ceil(DATA_BLOCK_SIZE);
        if data.len() != data_blocks * block_size {
            return Err(VaultError::InvalidData(format!(
                "expected {} coded bytes for {} original bytes, found {}",
                data_blocks * block_size,
                original_size,
                data.len()
            )));
        }

        Ok(Self {
            original_size,
            redundancy_percent: redundancy,
            block_size,
            data_blocks,
            parity_blocks: parity_blocks(data_blocks, redundancy),
            data,
        })
    }
}

/// Reed-Solomon codec configured for one redundancy percentage.
#[derive(Debug, Clone, Copy)]
pub struct FecCodec {
    redundancy: u8,
    geometry: BlockGeometry,
}

impl FecCodec {
    /// Create a codec for `redundancy` percent (5..=50).
    pub fn new(redundancy: u8) -> Result<Self> {
        let geometry = BlockGeometry::for_redundancy(redundancy)?;
        Ok(Self {
            redundancy,
            geometry,
        })
    }

    pub fn redundancy(&self) -> u8 {
        self.redundancy
    }

    pub fn geometry(&self) -> BlockGeometry {
        self.geometry
    }

    /// Guaranteed correction capacity as a percentage of encoded bytes.
    pub fn max_correctable_percent(&self) -> f64 {
        f64::from(self.redundancy) / 2.0
    }

    /// Encode `data`, padding it to a whole number of blocks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for empty input.
    pub fn encode(&self, data: &[u8]) -> Result<EncodedData> {
        if data.is_empty() {
            return Err(VaultError::InvalidData("cannot FEC-encode empty data".to_string()));
        }

        let geometry = self.geometry;
        let encoder = Encoder::new(geometry.parity_per_codeword);
        let data_blocks = data.len().div_ceil(DATA_BLOCK_SIZE);
        let mut out = Vec::with_capacity(data_blocks * geometry.block_size());
        let mut share = Vec::with_capacity(DATA_BLOCK_SIZE);

        for chunk in data.chunks(DATA_BLOCK_SIZE) {
            let mut block = [0u8; DATA_BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);

            for index in 0..geometry.codewords {
                share.clear();
                share.extend(block.iter().skip(index).step_by(geometry.codewords));
                let codeword = encoder.encode(&share);
                out.extend_from_slice(codeword.data());
                out.extend_from_slice(codeword.ecc());
            }
        }

        debug!(
            redundancy = self.redundancy,
            codewords = geometry.codewords,
            parity = geometry.parity_per_codeword,
            input = data.len(),
            output = out.len(),
            "fec encoded"
        );

        Ok(EncodedData {
            original_size: data.len(),
            redundancy_percent: self.redundancy,
            block_size: geometry.block_size(),
            data_blocks,
            parity_blocks: parity_blocks(data_blocks, self.redundancy),
            data: out,
        })
    }

    /// Decode block by block and strip padding.
    ///
    /// # Errors
    ///
    /// Returns `DecodingFailed` if any codeword holds more errors than its
    /// parity can correct, and `InvalidData` if the metadata does not match
    /// this codec.
    pub fn decode(&self, encoded: &EncodedData) -> Result<Vec<u8>> {
        if encoded.redundancy_percent != self.redundancy {
            return Err(VaultError::InvalidData(format!(
                "data encoded at {}% cannot be decoded at {}%",
                encoded.redundancy_percent, self.redundancy
            )));
        }
        let geometry = self.geometry;
        let block_size = geometry.block_size();
        if encoded.original_size == 0
            || encoded.data.is_empty()
            || encoded.data.len() % block_size != 0
            || encoded.data.len() / block_size != encoded.original_size.div_ceil(DATA_BLOCK_SIZE)
        {
            return Err(VaultError::InvalidData(
                "encoded length does not match block layout".to_string(),
            ));
        }

        let decoder = Decoder::new(geometry.parity_per_codeword);
        let mut out = Vec::with_capacity(encoded.data.len() / block_size * DATA_BLOCK_SIZE);
        let mut codeword = Vec::with_capacity(MAX_CODEWORD_SIZE);

        for (block_index, coded) in encoded.data.chunks(block_size).enumerate() {
            let mut block = [0u8; DATA_BLOCK_SIZE];
            let mut offset = 0;

            for index in 0..geometry.codewords {
                let share = geometry.data_share(index);
                let length = share + geometry.parity_per_codeword;
                codeword.clear();
                codeword.extend_from_slice(&coded[offset..offset + length]);
                offset += length;

                let corrected = decoder.correct(&mut codeword[..], None).map_err(|_| {
                    VaultError::DecodingFailed(format!(
                        "block {} exceeds correction capacity",
                        block_index
                    ))
                })?;
                for (position, byte) in corrected.data().iter().enumerate() {
                    block[index + position * geometry.codewords] = *byte;
                }
            }

            out.extend_from_slice(&block);
        }

        out.truncate(encoded.original_size);
        Ok(out)
    }
}

/// Reject redundancy outside 5..=50.
pub fn validate_redundancy(redundancy: u8) -> Result<()> {
    if !(MIN_REDUNDANCY..=MAX_REDUNDANCY).contains(&redundancy) {
        return Err(VaultError::InvalidData(format!(
            "FEC redundancy must be between {} and {} percent (got {})",
            MIN_REDUNDANCY, MAX_REDUNDANCY, redundancy
        )));
    }
    Ok(())
}

fn parity_blocks(data_blocks: usize, redundancy: u8) -> usize {
    (data_blocks * redundancy as usize).div_ceil(100)
}
