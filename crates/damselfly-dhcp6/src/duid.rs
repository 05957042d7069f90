//! DHCP Unique Identifier values
//!
//! A DUID identifies one DHCP participant. The pipeline never interprets
//! its internal structure; it only needs a stable equality/ordering
//! contract for matching client identifiers against configured values.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An opaque DHCP Unique Identifier
///
/// Compares and hashes by raw bytes. Displayed as colon-separated
/// lowercase hex, and parsed from hex with or without separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duid(Vec<u8>);

impl Duid {
    /// Create a DUID from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw DUID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length DUID
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Duid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Error parsing a DUID from text
#[derive(Debug, Error)]
#[error("invalid DUID `{0}`: expected an even number of hex digits")]
pub struct DuidParseError(String);

impl FromStr for Duid {
    type Err = DuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(DuidParseError(s.to_string()));
        }

        let mut bytes = Vec::with_capacity(digits.len() / 2);
        let raw = digits.as_bytes();
        for pair in raw.chunks(2) {
            let pair = std::str::from_utf8(pair).map_err(|_| DuidParseError(s.to_string()))?;
            let byte =
                u8::from_str_radix(pair, 16).map_err(|_| DuidParseError(s.to_string()))?;
            bytes.push(byte);
        }

        Ok(Self(bytes))
    }
}
