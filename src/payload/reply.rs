//! # Reply Decoding
//!
//! Replies echo the two command bytes and carry the value after them. The layout is
//! selected by the data length code, and for full 8-byte frames by the echoed command
//! marker:
//!
//! | DLC | Layout                                                        |
//! |-----|---------------------------------------------------------------|
//! | 3   | one byte integer                                              |
//! | 4   | two byte little-endian integer                                |
//! | 5   | three ASCII characters                                        |
//! | 8   | `0x84`: firmware revision bytes up to an `0xFF` terminator    |
//! | 8   | `0xC0`: six bytes of scaling factors, little-endian, 48 bits  |
//! | 8   | otherwise: six ASCII characters                               |
//!
//! A reply from any other arbitration id than the expected one is reported as
//! [`Reply::NotForUs`] rather than as an error.

use crate::can::address::DeviceAddress;
use crate::can::frame::CanFrame;
use crate::constants::{
    FIRMWARE_TERMINATOR, MARKER_FIRMWARE, MARKER_SCALING_FACTOR, REPLY_ECHO_LEN,
};
use crate::error::MwCanError;
use crate::payload::value::DecodedValue;
use log::debug;
use nom::bytes::complete::{take, take_till};
use nom::number::complete::{be_u8, le_u16};
use nom::IResult;

/// Outcome of decoding one received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value(DecodedValue),
    /// The frame came from another node; the caller treats it as no reply.
    NotForUs,
}

/// Validates the source of `frame` and decodes its payload.
pub fn decode_reply(frame: &CanFrame, address: &DeviceAddress) -> Result<Reply, MwCanError> {
    if !address.accepts(frame.id) {
        debug!(
            "Ignoring frame {} (expected {})",
            frame,
            address.expected_reply_prefix()
        );
        return Ok(Reply::NotForUs);
    }

    decode_payload(&frame.data).map(Reply::Value)
}

/// Decodes a reply payload by its length and marker.
pub fn decode_payload(data: &[u8]) -> Result<DecodedValue, MwCanError> {
    let (value_bytes, marker) = parse_echo(data).map_err(|_| {
        MwCanError::ProtocolDecode(format!("reply too short ({} bytes)", data.len()))
    })?;

    let value = match data.len() {
        3 => parse_byte(value_bytes).map(|(_, v)| DecodedValue::Integer(i64::from(v))),
        4 => parse_word(value_bytes).map(|(_, v)| DecodedValue::Integer(i64::from(v))),
        5 => parse_segment(value_bytes, 3).map(|(_, s)| s),
        8 => match marker {
            MARKER_FIRMWARE => return decode_firmware(value_bytes),
            MARKER_SCALING_FACTOR => {
                parse_scaling_factor(value_bytes).map(|(_, v)| DecodedValue::Integer(v))
            }
            _ => parse_segment(value_bytes, 6).map(|(_, s)| s),
        },
        n => {
            return Err(MwCanError::ProtocolDecode(format!(
                "unsupported reply length {n}: {}",
                hex::encode(data)
            )))
        }
    };

    value
        .map_err(|e| MwCanError::ProtocolDecode(format!("{e:?} in {}", hex::encode(data))))
        .inspect(|v| debug!("Decoded reply {} -> {:?}", hex::encode(data), v))
}

/// Splits off the echoed command bytes; returns the command low byte as marker.
fn parse_echo(input: &[u8]) -> IResult<&[u8], u8> {
    let (rest, echo) = take(REPLY_ECHO_LEN)(input)?;
    Ok((rest, echo[0]))
}

/// One-byte value, taken as the byte's numeric value (base 16).
///
/// Older Python tooling for these devices parsed the hex text of this byte as
/// octal: `0x10` read as 8, and any byte with a nibble of 8 or more (`0x08`,
/// `0x0A`, `0xFF` ...) failed to parse. Only `0x00..=0x07` agree between the two.
fn parse_byte(input: &[u8]) -> IResult<&[u8], u8> {
    be_u8(input)
}

fn parse_word(input: &[u8]) -> IResult<&[u8], u16> {
    le_u16(input)
}

/// Takes `len` bytes as ASCII text, or keeps them raw if they are not ASCII.
fn parse_segment(input: &[u8], len: usize) -> IResult<&[u8], DecodedValue> {
    let (rest, bytes) = take(len)(input)?;
    let value = if bytes.is_ascii() {
        DecodedValue::Text(bytes.iter().map(|&b| b as char).collect())
    } else {
        DecodedValue::Raw(bytes.to_vec())
    };
    Ok((rest, value))
}

/// Six bytes sent least significant first, read as one 48-bit number.
fn parse_scaling_factor(input: &[u8]) -> IResult<&[u8], i64> {
    let (rest, bytes) = take(6usize)(input)?;
    let value = bytes
        .iter()
        .rev()
        .fold(0i64, |acc, &b| (acc << 8) | i64::from(b));
    Ok((rest, value))
}

fn parse_firmware(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till(|b: u8| b == FIRMWARE_TERMINATOR)(input)
}

/// Firmware revision bytes up to the terminator, read big-endian.
fn decode_firmware(input: &[u8]) -> Result<DecodedValue, MwCanError> {
    let (_, revision) = parse_firmware(input)
        .map_err(|e| MwCanError::ProtocolDecode(format!("firmware reply: {e:?}")))?;

    if revision.is_empty() {
        return Err(MwCanError::ProtocolDecode(
            "firmware reply carries no revision bytes".into(),
        ));
    }

    let word = revision
        .iter()
        .fold(0i64, |acc, &b| (acc << 8) | i64::from(b));
    Ok(DecodedValue::Integer(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::address::DeviceVariant;

    fn psu() -> DeviceAddress {
        DeviceAddress::resolve(DeviceVariant::PowerSupply, 3).unwrap()
    }

    #[test]
    fn test_decode_byte_as_base16_value() {
        let v = decode_payload(&[0x00, 0x00, 0x01]).unwrap();
        assert_eq!(v, DecodedValue::Integer(1));
        // 0x10 is sixteen, not the octal reading 8
        let v = decode_payload(&[0x00, 0x00, 0x10]).unwrap();
        assert_eq!(v, DecodedValue::Integer(16));
        // Bytes with a nibble above 7 decode too
        let v = decode_payload(&[0x00, 0x01, 0x0A]).unwrap();
        assert_eq!(v, DecodedValue::Integer(10));
        let v = decode_payload(&[0x00, 0x01, 0xFF]).unwrap();
        assert_eq!(v, DecodedValue::Integer(255));
    }

    #[test]
    fn test_decode_word() {
        let v = decode_payload(&[0x60, 0x00, 0x06, 0x0A]).unwrap();
        assert_eq!(v, DecodedValue::Integer(2566));
    }

    #[test]
    fn test_decode_three_char_segment() {
        let v = decode_payload(&[0x82, 0x00, b'B', b'I', b'C']).unwrap();
        assert_eq!(v, DecodedValue::Text("BIC".into()));
    }

    #[test]
    fn test_decode_six_char_segment() {
        let v = decode_payload(b"\x82\x00BIC-22").unwrap();
        assert_eq!(v, DecodedValue::Text("BIC-22".into()));
    }

    #[test]
    fn test_decode_non_ascii_segment_is_raw() {
        let v = decode_payload(&[0x87, 0x00, 0x80, 0x81, 0x82]).unwrap();
        assert_eq!(v, DecodedValue::Raw(vec![0x80, 0x81, 0x82]));
    }

    #[test]
    fn test_decode_firmware() {
        let v = decode_payload(&[0x84, 0x00, 0x0A, 0x05, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(v, DecodedValue::Integer(0x0A05));
    }

    #[test]
    fn test_decode_firmware_without_revision() {
        let err = decode_payload(&[0x84, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(err, Err(MwCanError::ProtocolDecode(_))));
    }

    #[test]
    fn test_decode_scaling_factor() {
        let v = decode_payload(&[0xC0, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).unwrap();
        assert_eq!(v, DecodedValue::Integer(0x6655_4433_2211));
    }

    #[test]
    fn test_unsupported_lengths() {
        for len in [0usize, 1, 2, 6, 7] {
            let data = vec![0x41u8; len];
            assert!(
                matches!(decode_payload(&data), Err(MwCanError::ProtocolDecode(_))),
                "length {len} should not decode"
            );
        }
    }

    #[test]
    fn test_reply_from_other_node_is_not_for_us() {
        let frame = CanFrame::new(0x000C_0204, &[0x60, 0x00, 0x06, 0x0A]);
        assert_eq!(decode_reply(&frame, &psu()).unwrap(), Reply::NotForUs);
    }

    #[test]
    fn test_reply_from_own_node() {
        let frame = CanFrame::new(0x000C_0203, &[0x60, 0x00, 0x06, 0x0A]);
        assert_eq!(
            decode_reply(&frame, &psu()).unwrap(),
            Reply::Value(DecodedValue::Integer(2566))
        );
    }
}
