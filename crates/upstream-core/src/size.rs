//! Byte unit conversions and shard size parsing

use crate::error::{Error, Result};

/// Conversions between bytes, KiB and MiB
pub struct SizeHelpers;

impl SizeHelpers {
    pub fn bytes_to_kib(value: u64) -> f64 {
        value as f64 / 1024.0
    }

    pub fn bytes_to_mib(value: u64) -> f64 {
        value as f64 / 1024.0 / 1024.0
    }

    pub fn kib_to_bytes(value: u64) -> u64 {
        value * 1024
    }

    pub fn mib_to_bytes(value: u64) -> u64 {
        value * 1024 * 1024
    }
}

/// Result of parsing a shard size string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedSize {
    /// Size in bytes
    Bytes(u64),
    /// The string ended in a unit letter that is not one of `b`, `k`, `m`
    Unsupported(char),
}

impl ParsedSize {
    /// The size in bytes, or `None` for an unsupported unit
    pub fn bytes(self) -> Option<u64> {
        match self {
            ParsedSize::Bytes(n) => Some(n),
            ParsedSize::Unsupported(_) => None,
        }
    }
}

/// Parse a size such as `250m`, `512k`, `1024b` or a bare `1024`.
///
/// The unit suffix is case-insensitive: `b` is bytes, `k` KiB and `m` MiB.
/// Any other trailing letter yields [`ParsedSize::Unsupported`]. A numeric
/// part that is not an unsigned integer is an [`Error::InvalidSize`].
pub fn parse_shard_size(text: &str) -> Result<ParsedSize> {
    let text = text.trim();
    let invalid = || Error::InvalidSize(format!("'{}' is not a size", text));

    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().map(ParsedSize::Bytes).map_err(|_| invalid());
    }

    let last = text.chars().last().ok_or_else(invalid)?;
    let number: u64 = text[..text.len() - last.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;

    let bytes = match last.to_ascii_lowercase() {
        'b' => number,
        'k' => number.checked_mul(1024).ok_or_else(invalid)?,
        'm' => number.checked_mul(1024 * 1024).ok_or_else(invalid)?,
        other => return Ok(ParsedSize::Unsupported(other)),
    };

    Ok(ParsedSize::Bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(SizeHelpers::kib_to_bytes(512), 524_288);
        assert_eq!(SizeHelpers::mib_to_bytes(250), 262_144_000);
        assert!((SizeHelpers::bytes_to_kib(1536) - 1.5).abs() < f64::EPSILON);
        assert!((SizeHelpers::bytes_to_mib(1_048_576) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_shard_size() {
        assert_eq!(parse_shard_size("1024").unwrap(), ParsedSize::Bytes(1024));
        assert_eq!(parse_shard_size("1024b").unwrap(), ParsedSize::Bytes(1024));
        assert_eq!(parse_shard_size("1k").unwrap(), ParsedSize::Bytes(1024));
        assert_eq!(parse_shard_size("1m").unwrap(), ParsedSize::Bytes(1_048_576));
        assert_eq!(parse_shard_size("25M").unwrap(), ParsedSize::Bytes(26_214_400));
        assert_eq!(parse_shard_size("512K").unwrap(), ParsedSize::Bytes(524_288));
    }

    #[test]
    fn test_parse_unsupported_unit() {
        let parsed = parse_shard_size("1g").unwrap();
        assert_eq!(parsed, ParsedSize::Unsupported('g'));
        assert_eq!(parsed.bytes(), None);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(parse_shard_size(""), Err(Error::InvalidSize(_))));
        assert!(matches!(parse_shard_size("m"), Err(Error::InvalidSize(_))));
        assert!(matches!(parse_shard_size("1.5m"), Err(Error::InvalidSize(_))));
    }
}
