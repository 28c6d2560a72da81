//! Hex-text parsing and formatting
//!
//! Two input conventions survive from the historical tooling and both are
//! kept: whitespace-separated byte tokens, and packed digit pairs. They differ
//! on malformed input, so they are exposed as distinct operations rather than
//! folded into one parser.

use super::HexError;
use crate::core::checksum::ChecksumKind;
use regex::Regex;
use std::sync::OnceLock;

/// Drop whitespace and `0x`/`0X` markers anywhere in the text.
fn strip(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact.replace("0x", "").replace("0X", "")
}

fn parse_byte(group: &str) -> Result<u8, HexError> {
    u8::from_str_radix(group, 16).map_err(|_| HexError::InvalidDigit(group.to_string()))
}

/// Decode whitespace-separated hex tokens, one byte per token.
///
/// `"01 02 FF"` → `[0x01, 0x02, 0xFF]`. Tokens of one digit are accepted
/// (`"F"` → `0x0F`); anything longer than two digits or non-hex fails with
/// [`HexError::InvalidDigit`].
pub fn decode_spaced(text: &str) -> Result<Vec<u8>, HexError> {
    text.split_whitespace()
        .map(|token| {
            if token.len() > 2 {
                return Err(HexError::InvalidDigit(token.to_string()));
            }
            parse_byte(token)
        })
        .collect()
}

/// Decode packed hex text, two digits per byte.
///
/// Whitespace and `0x`/`0X` markers are stripped first. An odd number of
/// remaining digits fails with [`HexError::OddLength`].
pub fn decode_packed(text: &str) -> Result<Vec<u8>, HexError> {
    let cleaned = strip(text);
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength);
    }
    decode_groups(&cleaned)
}

/// Decode packed hex text, tolerating an odd trailing digit.
///
/// Identical to [`decode_packed`] except that a lone trailing digit becomes
/// its own byte: `"ABC"` → `[0xAB, 0x0C]`. This mirrors the historical
/// parser, which padded the final fragment instead of rejecting it; callers
/// that want strict framing should use [`decode_packed`].
pub fn decode_packed_lenient(text: &str) -> Result<Vec<u8>, HexError> {
    decode_groups(&strip(text))
}

fn decode_groups(cleaned: &str) -> Result<Vec<u8>, HexError> {
    cleaned
        .as_bytes()
        .chunks(2)
        .map(|chunk| {
            let group = std::str::from_utf8(chunk)
                .map_err(|_| HexError::InvalidDigit(String::from_utf8_lossy(chunk).into_owned()))?;
            parse_byte(group)
        })
        .collect()
}

/// Render bytes as uppercase two-digit hex.
///
/// With `separated`, every byte is followed by a single space, including the
/// last; the historical display format kept that trailing space.
pub fn encode(bytes: &[u8], separated: bool) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        out.push_str(&format!("{byte:02X}"));
        if separated {
            out.push(' ');
        }
    }
    out
}

/// Parse packed hex text, append the checksum trailer, return the combined
/// hex text.
///
/// The input text is returned verbatim with the trailer's hex rendering
/// appended; the result is text, not bytes.
pub fn append_checksum(hex_text: &str, kind: ChecksumKind) -> Result<String, HexError> {
    let data = decode_packed(hex_text)?;
    let trailer = kind.trailer(&data);
    Ok(format!("{hex_text}{}", encode(&trailer, false)))
}

/// Check that text ends in one or more hex digits.
///
/// This keeps the historical validation pattern `[0-9a-fA-F]+$` verbatim:
/// the pattern is anchored at the end only, so a non-hex prefix before a
/// valid hex tail is NOT rejected (`"zz1F"` passes). Callers needing a full
/// validation should parse with [`decode_packed`] instead.
pub fn is_hex_digits_only(text: &str) -> bool {
    static HEX_TAIL: OnceLock<Regex> = OnceLock::new();
    let re = HEX_TAIL.get_or_init(|| {
        Regex::new("[0-9a-fA-F]+$").expect("static hex pattern compiles")
    });
    re.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_spaced() {
        assert_eq!(decode_spaced("01 02 FF").unwrap(), vec![0x01, 0x02, 0xFF]);
        assert_eq!(decode_spaced("F 10").unwrap(), vec![0x0F, 0x10]);
        assert_eq!(decode_spaced("").unwrap(), Vec::<u8>::new());
        assert!(matches!(
            decode_spaced("01 GG"),
            Err(HexError::InvalidDigit(_))
        ));
        assert!(matches!(
            decode_spaced("01 123"),
            Err(HexError::InvalidDigit(_))
        ));
    }

    #[test]
    fn test_decode_packed() {
        assert_eq!(decode_packed("0102FF").unwrap(), vec![0x01, 0x02, 0xFF]);
        assert_eq!(decode_packed("0x01 0x02").unwrap(), vec![0x01, 0x02]);
        assert_eq!(decode_packed("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_packed("ABC"), Err(HexError::OddLength));
        assert!(matches!(decode_packed("01ZZ"), Err(HexError::InvalidDigit(_))));
    }

    #[test]
    fn test_decode_packed_lenient_pads_odd_tail() {
        assert_eq!(decode_packed_lenient("ABC").unwrap(), vec![0xAB, 0x0C]);
        assert_eq!(decode_packed_lenient("0102").unwrap(), vec![0x01, 0x02]);
        assert_eq!(decode_packed_lenient("F").unwrap(), vec![0x0F]);
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode(&[0x48, 0x65, 0x6C], false), "48656C");
        // Legacy separated format keeps the trailing space.
        assert_eq!(encode(&[0x48, 0x65], true), "48 65 ");
        assert_eq!(encode(&[], false), "");
    }

    #[test]
    fn test_round_trip() {
        let bytes = vec![0x00, 0x7F, 0x80, 0xFF, 0x12];
        assert_eq!(decode_packed(&encode(&bytes, false)).unwrap(), bytes);
        assert_eq!(decode_spaced(&encode(&bytes, true)).unwrap(), bytes);
    }

    #[test]
    fn test_append_checksum_worked_example() {
        // [0x01, 0x02] → CRC-16/MODBUS 0xE181, rendered low byte first.
        assert_eq!(
            append_checksum("0102", ChecksumKind::Crc16Modbus).unwrap(),
            "010281E1"
        );
        assert_eq!(
            append_checksum("313233343536373839", ChecksumKind::Crc16Modbus).unwrap(),
            "313233343536373839374B"
        );
        assert_eq!(
            append_checksum("FF01", ChecksumKind::Sum8).unwrap(),
            "FF0100"
        );
        assert_eq!(append_checksum("ABC", ChecksumKind::Sum8), Err(HexError::OddLength));
    }

    #[test]
    fn test_is_hex_digits_only_quirk() {
        assert!(is_hex_digits_only("1F"));
        assert!(is_hex_digits_only("deadBEEF"));
        // End-anchored only: a garbage prefix is not rejected.
        assert!(is_hex_digits_only("zz1F"));
        assert!(!is_hex_digits_only("1Fzz"));
        assert!(!is_hex_digits_only(""));
        assert!(!is_hex_digits_only("xyz"));
    }
}
