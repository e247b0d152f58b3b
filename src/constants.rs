//! Mean Well CAN Protocol Constants
//!
//! Command codes, arbitration id bases and timing values for the BIC-2200 and NPB
//! CAN protocol. Command codes are given as their 16-bit value; on the wire they are
//! sent low byte first.

use std::time::Duration;

// ----------------------------------------------------------------------------
// Addressing
// ----------------------------------------------------------------------------

/// Write arbitration id base for the BIC-2200 bidirectional power supply
pub const POWER_SUPPLY_WRITE_BASE: u32 = 0x000C_0300;

/// Write arbitration id base for the NPB charger
pub const CHARGER_WRITE_BASE: u32 = 0x000C_0100;

/// Command-class bit cleared in replies (controller → device vs device → controller)
pub const REPLY_CLASS_BIT: u32 = 0x0000_0100;

/// Highest node id accepted by the BIC-2200 (jumper block, 3 bits)
pub const POWER_SUPPLY_MAX_NODE: u8 = 7;

/// Highest node id accepted by the NPB (jumper block, 2 bits)
pub const CHARGER_MAX_NODE: u8 = 3;

// ----------------------------------------------------------------------------
// Command codes
// ----------------------------------------------------------------------------

pub const CMD_OPERATION: u16 = 0x0000;
pub const CMD_VOUT_SET: u16 = 0x0020;
pub const CMD_IOUT_SET: u16 = 0x0030;
pub const CMD_FAULT_STATUS: u16 = 0x0040;
pub const CMD_READ_VIN: u16 = 0x0050;
pub const CMD_READ_VOUT: u16 = 0x0060;
pub const CMD_READ_IOUT: u16 = 0x0061;
pub const CMD_READ_TEMPERATURE: u16 = 0x0062;
pub const CMD_READ_FAN_SPEED_1: u16 = 0x0070;
pub const CMD_READ_FAN_SPEED_2: u16 = 0x0071;
pub const CMD_MFR_ID_B0B5: u16 = 0x0080;
pub const CMD_MFR_ID_B6B11: u16 = 0x0081;
pub const CMD_MFR_MODEL_B0B5: u16 = 0x0082;
pub const CMD_MFR_MODEL_B6B11: u16 = 0x0083;
pub const CMD_MFR_REVISION: u16 = 0x0084;
pub const CMD_MFR_LOCATION: u16 = 0x0085;
pub const CMD_MFR_DATE: u16 = 0x0086;
pub const CMD_MFR_SERIAL_B0B5: u16 = 0x0087;
pub const CMD_MFR_SERIAL_B6B11: u16 = 0x0088;
pub const CMD_CURVE_CC: u16 = 0x00B0;
pub const CMD_CURVE_CV: u16 = 0x00B1;
pub const CMD_CURVE_FV: u16 = 0x00B2;
pub const CMD_CURVE_TC: u16 = 0x00B3;
pub const CMD_CURVE_CONFIG: u16 = 0x00B4;
pub const CMD_CURVE_CC_TIMEOUT: u16 = 0x00B5;
pub const CMD_CURVE_CV_TIMEOUT: u16 = 0x00B6;
pub const CMD_CURVE_FV_TIMEOUT: u16 = 0x00B7;
pub const CMD_CHG_STATUS: u16 = 0x00B8;
pub const CMD_SCALING_FACTOR: u16 = 0x00C0;
pub const CMD_SYSTEM_STATUS: u16 = 0x00C1;
pub const CMD_SYSTEM_CONFIG: u16 = 0x00C2;
pub const CMD_DIRECTION_CTRL: u16 = 0x0100;
pub const CMD_REVERSE_VOUT_SET: u16 = 0x0120;
pub const CMD_REVERSE_IOUT_SET: u16 = 0x0130;
pub const CMD_BIDIRECTIONAL_CONFIG: u16 = 0x0140;

// ----------------------------------------------------------------------------
// Reply layout
// ----------------------------------------------------------------------------

/// Every reply echoes the two command bytes before the value
pub const REPLY_ECHO_LEN: usize = 2;

/// Marker (echoed command low byte) of the 8-byte firmware reply
pub const MARKER_FIRMWARE: u8 = 0x84;

/// Marker (echoed command low byte) of the 8-byte scaling factor reply
pub const MARKER_SCALING_FACTOR: u8 = 0xC0;

/// Terminator of the firmware revision field
pub const FIRMWARE_TERMINATOR: u8 = 0xFF;

/// Raw DC current readings above this are negative values on the BIC-2200
pub const SIGNED_CURRENT_THRESHOLD: i64 = 20_000;

/// Value returned by numeric reads when no reply arrived
pub const NO_REPLY: i64 = -1;

// ----------------------------------------------------------------------------
// Timing and link defaults
// ----------------------------------------------------------------------------

/// Fixed wait for a single reply frame
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Bus bitrate used by both device families
pub const DEFAULT_BITRATE: u32 = 250_000;

/// Transmit queue length set on interfaces we bring up
pub const DEFAULT_TXQUEUELEN: u32 = 1000;

/// Default SocketCAN interface name
pub const DEFAULT_INTERFACE: &str = "can0";

/// Default serial device of USB-CAN (slcan) adapters
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyACM0";
