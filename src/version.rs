// src/version.rs

//! Package version strings
//!
//! Versions are dot-separated segments such as `1.2.10` or `2.0-beta`. Each
//! segment is split into a leading number and a textual remainder; segments
//! compare by number first, then by remainder (case-insensitive). Missing
//! trailing segments count as zero, so `1.0` and `1` are the same version.
//!
//! Parsing never fails: anything that is not a number becomes text.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
struct Segment {
    number: u64,
    suffix: String,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let digits = raw.chars().take_while(|c| c.is_ascii_digit()).count();
        let (head, tail) = raw.split_at(digits);
        // Digit runs too long for u64 fall back to text ordering
        match head.parse::<u64>() {
            Ok(number) => Self {
                number,
                suffix: tail.to_ascii_lowercase(),
            },
            Err(_) if head.is_empty() => Self {
                number: 0,
                suffix: tail.to_ascii_lowercase(),
            },
            Err(_) => Self {
                number: u64::MAX,
                suffix: raw.to_ascii_lowercase(),
            },
        }
    }

    fn is_zero(&self) -> bool {
        self.number == 0 && self.suffix.is_empty()
    }
}

/// A parsed package version that keeps its original text for display
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version string
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut segments: Vec<Segment> = if raw.is_empty() {
            Vec::new()
        } else {
            raw.split('.').map(Segment::parse).collect()
        };

        while segments.last().is_some_and(Segment::is_zero) {
            segments.pop();
        }

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The version text as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True for the empty version (`""`, `0`, `0.0`, ...)
    pub fn is_zero(&self) -> bool {
        self.segments.is_empty()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Segment::default();
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.raw)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_compare_numerically() {
        assert!(Version::parse("1.10") > Version::parse("1.9"));
        assert!(Version::parse("2.0") > Version::parse("1.99.99"));
        assert!(Version::parse("1.5") > Version::parse("1.0"));
    }

    #[test]
    fn test_trailing_zeros_are_ignored() {
        assert_eq!(Version::parse("1.0"), Version::parse("1"));
        assert_eq!(Version::parse("1.0.0.0"), Version::parse("1"));
        assert!(Version::parse("0.0").is_zero());
        assert!(Version::parse("").is_zero());
    }

    #[test]
    fn test_text_segments() {
        assert!(Version::parse("1.0b") > Version::parse("1.0a"));
        assert!(Version::parse("1.0a") > Version::parse("1.0"));
        assert_eq!(Version::parse("1.0-BETA"), Version::parse("1.0-beta"));
    }

    #[test]
    fn test_display_keeps_original_text() {
        let v = Version::parse("1.0.0");
        assert_eq!(v.to_string(), "1.0.0");
        assert_eq!(v, Version::parse("1"));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let v: Version = serde_json::from_str("\"2.3\"").unwrap();
        assert_eq!(v.as_str(), "2.3");
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"2.3\"");
    }
}
