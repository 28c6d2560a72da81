//! Frame codec: hex-text representation of frames
//!
//! Converts between the textual hex representation used at command boundaries
//! and raw byte sequences, and appends integrity trailers to hex-text frames.

mod hex;

pub use self::hex::{
    append_checksum, decode_packed, decode_packed_lenient, decode_spaced, encode,
    is_hex_digits_only,
};

use thiserror::Error;

/// Hex-text parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    /// Packed hex text has an odd number of digits
    #[error("hex text has an odd number of digits")]
    OddLength,

    /// A token or digit group is not valid hexadecimal
    #[error("invalid hex digit in {0:?}")]
    InvalidDigit(String),
}
