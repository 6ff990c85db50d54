//! Value parsing for telemetry attributes
//!
//! Counters in both documents are plain integers, but some engine builds write
//! them as floats or with thousands separators. Nothing here ever fails: a value
//! that cannot be read is absent.

use once_cell::sync::Lazy;
use regex::Regex;

static VERTEX_KIND_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+\d+_(.+)$").unwrap());

pub const UNKNOWN_VERTEX_KIND: &str = "Unknown";

pub struct ValueParser;

impl ValueParser {
    /// Parse a non-negative integer counter
    ///
    /// Accepts "1234", "1,234", " 12 " and finite non-negative floats ("12.0",
    /// truncated). Returns None for empty, negative or non-numeric text.
    pub fn parse_u64(value: &str) -> Option<u64> {
        let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return None;
        }

        if let Ok(n) = cleaned.parse::<u64>() {
            return Some(n);
        }

        match cleaned.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 => Some(f.trunc() as u64),
            _ => None,
        }
    }

    /// Parse an optional attribute, defaulting to 0
    pub fn u64_or_zero(value: Option<&str>) -> u64 {
        value.and_then(Self::parse_u64).unwrap_or(0)
    }

    /// Parse a source line number
    pub fn parse_line(value: &str) -> Option<u32> {
        Self::parse_u64(value).and_then(|n| u32::try_from(n).ok())
    }

    /// Vertex kind from an id shaped like "SV3_Aggregate_Split"
    pub fn vertex_kind(vertex_id: &str) -> String {
        VERTEX_KIND_REGEX
            .captures(vertex_id)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_VERTEX_KIND.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_variants() {
        assert_eq!(ValueParser::parse_u64("1234"), Some(1234));
        assert_eq!(ValueParser::parse_u64(" 1,234,567 "), Some(1_234_567));
        assert_eq!(ValueParser::parse_u64("12.9"), Some(12));
        assert_eq!(ValueParser::parse_u64("-5"), None);
        assert_eq!(ValueParser::parse_u64("NaN"), None);
        assert_eq!(ValueParser::parse_u64("abc"), None);
        assert_eq!(ValueParser::parse_u64(""), None);
    }

    #[test]
    fn test_u64_or_zero_defaults() {
        assert_eq!(ValueParser::u64_or_zero(None), 0);
        assert_eq!(ValueParser::u64_or_zero(Some("n/a")), 0);
        assert_eq!(ValueParser::u64_or_zero(Some("42")), 42);
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(ValueParser::parse_line("17"), Some(17));
        assert_eq!(ValueParser::parse_line("99999999999"), None);
    }

    #[test]
    fn test_vertex_kind() {
        assert_eq!(ValueParser::vertex_kind("SV1_Extract"), "Extract");
        assert_eq!(ValueParser::vertex_kind("SV12_Aggregate_Split"), "Aggregate_Split");
        assert_eq!(ValueParser::vertex_kind("SV3"), UNKNOWN_VERTEX_KIND);
        assert_eq!(ValueParser::vertex_kind("vertex"), UNKNOWN_VERTEX_KIND);
    }
}
