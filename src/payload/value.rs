//! Typed values decoded from reply payloads.

use std::fmt;

/// A decoded reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    /// Numeric value. Wide enough for the 48-bit scaling factor word.
    Integer(i64),
    /// One ASCII segment of a text read.
    Text(String),
    /// Payload that is neither a known numeric layout nor ASCII text.
    Raw(Vec<u8>),
}

impl DecodedValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DecodedValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DecodedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the shape, used in decode error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedValue::Integer(_) => "integer",
            DecodedValue::Text(_) => "text",
            DecodedValue::Raw(_) => "raw",
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Integer(v) => write!(f, "{v}"),
            DecodedValue::Text(s) => write!(f, "{s}"),
            DecodedValue::Raw(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

/// Firmware revision word split into the revisions of the two MCUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub mcu1: u8,
    pub mcu2: u8,
}

impl FirmwareVersion {
    /// Splits the 16-bit big-endian revision word; MCU1 is the high byte.
    pub fn from_word(word: i64) -> Self {
        FirmwareVersion {
            mcu1: ((word & 0xFF00) >> 8) as u8,
            mcu2: (word & 0x00FF) as u8,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.mcu1, self.mcu2)
    }
}

/// Converts a physical quantity into its ×100 wire value, rounding to nearest.
pub fn to_centi(value: f64) -> i64 {
    (value * 100.0).round() as i64
}
