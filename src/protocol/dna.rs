//! Device identifier ("DNA") parsing
//!
//! Units print their DNA in dashed-triplet form (`A5F2-16D1-00A2`). On the
//! wire it is the un-dashed hex number stored in 64 bits (`0xA5F216D100A2`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const COMPONENTS: usize = 3;
const COMPONENT_DIGITS: usize = 4;

/// Why a DNA string was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Splitting on `-` did not give three components
    ComponentCount(usize),
    /// Component has more than four characters
    TooLong(usize),
    /// Component is empty or contains a non-hex character
    NotHex(usize),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::ComponentCount(found) => {
                write!(f, "expected {} components, found {}", COMPONENTS, found)
            }
            MalformedReason::TooLong(index) => {
                write!(f, "component {} is longer than {} digits", index, COMPONENT_DIGITS)
            }
            MalformedReason::NotHex(index) => {
                write!(f, "component {} is not hexadecimal", index)
            }
        }
    }
}

/// A DNA string that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed DNA string {input:?}: {reason}")]
pub struct MalformedIdentifier {
    pub input: String,
    pub reason: MalformedReason,
}

/// 48-bit hardware identifier of a UDTX node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentifier(u64);

impl DeviceIdentifier {
    /// Largest representable identifier (`FFFF-FFFF-FFFF`)
    pub const MAX: u64 = 0xFFFF_FFFF_FFFF;

    /// Parse the dashed-triplet form
    pub fn parse(text: &str) -> Result<Self, MalformedIdentifier> {
        let malformed = |reason| MalformedIdentifier {
            input: text.to_string(),
            reason,
        };

        let parts: Vec<&str> = text.split('-').collect();
        if parts.len() != COMPONENTS {
            return Err(malformed(MalformedReason::ComponentCount(parts.len())));
        }

        let mut value = 0u64;
        for (index, part) in parts.iter().enumerate() {
            if part.len() > COMPONENT_DIGITS {
                return Err(malformed(MalformedReason::TooLong(index)));
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(malformed(MalformedReason::NotHex(index)));
            }
            let group = u16::from_str_radix(part, 16)
                .map_err(|_| malformed(MalformedReason::NotHex(index)))?;
            value = (value << 16) | u64::from(group);
        }

        Ok(Self(value))
    }

    /// Wrap a raw value, rejecting anything wider than 48 bits
    pub fn from_u64(value: u64) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl FromStr for DeviceIdentifier {
    type Err = MalformedIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}-{:04X}-{:04X}",
            (self.0 >> 32) & 0xFFFF,
            (self.0 >> 16) & 0xFFFF,
            self.0 & 0xFFFF
        )
    }
}

impl From<DeviceIdentifier> for u64 {
    fn from(dna: DeviceIdentifier) -> Self {
        dna.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concatenates_groups() {
        let dna = DeviceIdentifier::parse("A5F2-16D1-00A2").unwrap();
        assert_eq!(dna.as_u64(), 0xA5F2_16D1_00A2);
    }

    #[test]
    fn test_short_groups_are_zero_extended() {
        let dna = DeviceIdentifier::parse("1-a-ff").unwrap();
        assert_eq!(dna.as_u64(), 0x0001_000A_00FF);
        assert_eq!(dna.to_string(), "0001-000A-00FF");
    }

    #[test]
    fn test_lowercase_accepted() {
        let upper = DeviceIdentifier::parse("DEAD-BEEF-CAFE").unwrap();
        let lower = DeviceIdentifier::parse("dead-beef-cafe").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_display_parses_back() {
        let dna: DeviceIdentifier = "ffff-0-1234".parse().unwrap();
        let again = DeviceIdentifier::parse(&dna.to_string()).unwrap();
        assert_eq!(dna, again);
    }

    #[test]
    fn test_wrong_component_count() {
        for input in ["A5F2-16D1", "A5F2-16D1-00A2-0001", "A5F216D100A2", ""] {
            let err = DeviceIdentifier::parse(input).unwrap_err();
            assert!(matches!(err.reason, MalformedReason::ComponentCount(_)), "{input}");
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn test_component_too_long() {
        let err = DeviceIdentifier::parse("A5F2-16D10-00A2").unwrap_err();
        assert_eq!(err.reason, MalformedReason::TooLong(1));
    }

    #[test]
    fn test_non_hex_component() {
        let err = DeviceIdentifier::parse("A5F2-16D1-00G2").unwrap_err();
        assert_eq!(err.reason, MalformedReason::NotHex(2));

        let err = DeviceIdentifier::parse("A5F2--00A2").unwrap_err();
        assert_eq!(err.reason, MalformedReason::NotHex(1));

        let err = DeviceIdentifier::parse("+5F2-16D1-00A2").unwrap_err();
        assert_eq!(err.reason, MalformedReason::NotHex(0));
    }

    #[test]
    fn test_from_u64_bounds() {
        assert!(DeviceIdentifier::from_u64(DeviceIdentifier::MAX).is_some());
        assert!(DeviceIdentifier::from_u64(DeviceIdentifier::MAX + 1).is_none());
    }
}
