//! # CAN Frame Packing
//!
//! This module provides the typed CAN frame used across the crate and the packing of
//! request payloads. Decoding of reply payloads lives in [`crate::payload::reply`].
//!
//! ## Request layout
//!
//! Every request starts with the 16-bit command code, low byte first. Reads stop
//! there; writes append the value little-endian in one or two bytes:
//!
//! ```text
//! read          [cmd_lo, cmd_hi]
//! write (byte)  [cmd_lo, cmd_hi, val_lo]
//! write (word)  [cmd_lo, cmd_hi, val_lo, val_hi]
//! ```
//!
//! ```rust
//! use mwcan_rs::can::frame::{pack_request, Request, ValueWidth};
//!
//! let data = pack_request(0x0020, Request::Write { value: 2566, width: ValueWidth::Word });
//! assert_eq!(data, vec![0x20, 0x00, 0x06, 0x0A]);
//! ```

use crate::can::address::{format_id, DeviceAddress};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Largest classic CAN payload.
pub const CAN_MAX_DLC: usize = 8;

/// A classic CAN data frame with an extended (29-bit) identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub data: Vec<u8>,
}

impl CanFrame {
    /// Builds a frame; payloads longer than 8 bytes are truncated.
    pub fn new(id: u32, data: &[u8]) -> Self {
        let len = data.len().min(CAN_MAX_DLC);
        CanFrame {
            id: id & 0x1FFF_FFFF,
            data: data[..len].to_vec(),
        }
    }

    /// Data length code.
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// Builds the request frame for `command` addressed to `address`.
    pub fn request(address: &DeviceAddress, command: u16, request: Request) -> Self {
        CanFrame::new(address.write_id(), &pack_request(command, request))
    }

    /// The command code echoed in the first two bytes of a reply, if present.
    pub fn echoed_command(&self) -> Option<u16> {
        match self.data.as_slice() {
            [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            format_id(self.id),
            self.dlc(),
            hex::encode(&self.data)
        )
    }
}

/// Width of the value carried by a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWidth {
    Byte,
    Word,
}

/// Direction of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Read,
    Write { value: i64, width: ValueWidth },
}

/// Builds the outbound frame of `request` for `command` on `address`.
pub fn encode_request(address: &DeviceAddress, command: u16, request: Request) -> CanFrame {
    CanFrame::request(address, command, request)
}

/// Packs the request payload for `command`.
///
/// Write values are masked to the width on the wire.
pub fn pack_request(command: u16, request: Request) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u16_le(command);

    match request {
        Request::Read => {}
        Request::Write {
            value,
            width: ValueWidth::Byte,
        } => buf.put_u8((value & 0xFF) as u8),
        Request::Write {
            value,
            width: ValueWidth::Word,
        } => buf.put_u16_le((value & 0xFFFF) as u16),
    }

    buf.to_vec()
}
