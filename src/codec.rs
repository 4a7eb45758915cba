//! Legacy string encoding of binary buffers
//!
//! Older exports moved vault bytes through string-typed storage by reading
//! the buffer as little-endian 16-bit code units and turning each unit into
//! one string character. Everything else in this crate carries plain bytes;
//! this module only exists to import such exports.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer length {0} is not a whole number of 16-bit units")]
    OddLength(usize),

    #[error("code units do not form valid text")]
    InvalidUnits,
}

/// Encode bytes as a string of 16-bit code units.
///
/// Fails on odd-length buffers, and on buffers whose units contain unpaired
/// surrogates, which a Rust string cannot hold.
pub fn bytes_to_units(bytes: &[u8]) -> Result<String, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::OddLength(bytes.len()));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| CodecError::InvalidUnits)
}

/// Decode a string of 16-bit code units back into bytes
pub fn units_to_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
