//! # Command Table
//!
//! Maps every domain operation to its protocol command code, payload width, the
//! variants it exists on, and, for the settable set-points, the limit pair the
//! requested value is saturated into before it is encoded.

use crate::can::address::{Applicability, DeviceVariant};
use crate::can::frame::ValueWidth;
use crate::constants::*;
use crate::error::MwCanError;
use crate::profile::LimitKind;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Shape of the value a command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadWidth {
    /// One byte value (reply DLC 3, write DLC 3)
    Byte,
    /// Two byte little-endian value (reply DLC 4, write DLC 4)
    Word,
    /// ASCII text, optionally continued by a second command code
    Text { continuation: Option<u16> },
    /// Fixed 8-byte layouts (firmware revision, scaling factors)
    Special,
}

/// Whether the command accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

/// Fixed-point factor of a numeric value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// ×100, e.g. 2566 = 25.66 V
    Centi,
    /// ×10, e.g. 2301 = 230.1 V
    Deci,
    /// Plain integer or bit word
    Unit,
}

impl Scale {
    /// Renders a wire value in its physical unit.
    pub fn format(self, value: i64) -> String {
        match self {
            Scale::Centi => format!("{:.2}", value as f64 / 100.0),
            Scale::Deci => format!("{:.1}", value as f64 / 10.0),
            Scale::Unit => value.to_string(),
        }
    }
}

/// Protocol description of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub code: u16,
    pub width: PayloadWidth,
    pub access: Access,
    pub applies_to: Applicability,
    pub clamp: Option<LimitKind>,
    pub scale: Scale,
}

impl CommandSpec {
    const fn new(code: u16, width: PayloadWidth, access: Access) -> Self {
        CommandSpec {
            code,
            width,
            access,
            applies_to: Applicability::All,
            clamp: None,
            scale: Scale::Unit,
        }
    }

    const fn only(mut self, variant: DeviceVariant) -> Self {
        self.applies_to = Applicability::Only(variant);
        self
    }

    const fn clamped(mut self, kind: LimitKind) -> Self {
        self.clamp = Some(kind);
        self
    }

    const fn scaled(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    /// Width of the value in a write request, if the command is writable.
    pub fn write_width(&self) -> Option<ValueWidth> {
        match (self.access, self.width) {
            (Access::ReadWrite, PayloadWidth::Byte) => Some(ValueWidth::Byte),
            (Access::ReadWrite, PayloadWidth::Word) => Some(ValueWidth::Word),
            _ => None,
        }
    }

    /// Whether `code` is this command or the second half of its text.
    pub fn answers_to(&self, code: u16) -> bool {
        match self.width {
            PayloadWidth::Text {
                continuation: Some(next),
            } => self.code == code || next == code,
            _ => self.code == code,
        }
    }
}

/// Every domain operation the devices understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OutputEnable,
    ChargeVoltage,
    ChargeCurrent,
    FaultStatus,
    AcInputVoltage,
    DcOutputVoltage,
    DcOutputCurrent,
    Temperature,
    FanSpeed1,
    FanSpeed2,
    Manufacturer,
    ModelType,
    Firmware,
    FactoryLocation,
    ManufactureDate,
    SerialNumber,
    CurveConstantCurrent,
    CurveConstantVoltage,
    CurveFloatVoltage,
    CurveTaperCurrent,
    CurveConfig,
    CurveCcTimeout,
    CurveCvTimeout,
    CurveFvTimeout,
    ChargeStatus,
    ScalingFactor,
    SystemStatus,
    SystemConfig,
    Direction,
    DischargeVoltage,
    DischargeCurrent,
    BidirectionalConfig,
}

impl Operation {
    pub const ALL: [Operation; 32] = [
        Operation::OutputEnable,
        Operation::ChargeVoltage,
        Operation::ChargeCurrent,
        Operation::FaultStatus,
        Operation::AcInputVoltage,
        Operation::DcOutputVoltage,
        Operation::DcOutputCurrent,
        Operation::Temperature,
        Operation::FanSpeed1,
        Operation::FanSpeed2,
        Operation::Manufacturer,
        Operation::ModelType,
        Operation::Firmware,
        Operation::FactoryLocation,
        Operation::ManufactureDate,
        Operation::SerialNumber,
        Operation::CurveConstantCurrent,
        Operation::CurveConstantVoltage,
        Operation::CurveFloatVoltage,
        Operation::CurveTaperCurrent,
        Operation::CurveConfig,
        Operation::CurveCcTimeout,
        Operation::CurveCvTimeout,
        Operation::CurveFvTimeout,
        Operation::ChargeStatus,
        Operation::ScalingFactor,
        Operation::SystemStatus,
        Operation::SystemConfig,
        Operation::Direction,
        Operation::DischargeVoltage,
        Operation::DischargeCurrent,
        Operation::BidirectionalConfig,
    ];

    /// Looks up the protocol description of the operation.
    pub const fn spec(self) -> CommandSpec {
        use Access::*;
        use DeviceVariant::*;
        use PayloadWidth::*;

        match self {
            Operation::OutputEnable => CommandSpec::new(CMD_OPERATION, Byte, ReadWrite),
            Operation::ChargeVoltage => CommandSpec::new(CMD_VOUT_SET, Word, ReadWrite)
                .clamped(LimitKind::ChargeVoltage)
                .scaled(Scale::Centi),
            Operation::ChargeCurrent => CommandSpec::new(CMD_IOUT_SET, Word, ReadWrite)
                .clamped(LimitKind::ChargeCurrent)
                .scaled(Scale::Centi),
            Operation::FaultStatus => CommandSpec::new(CMD_FAULT_STATUS, Word, Read),
            Operation::AcInputVoltage => {
                CommandSpec::new(CMD_READ_VIN, Word, Read).scaled(Scale::Deci)
            }
            Operation::DcOutputVoltage => {
                CommandSpec::new(CMD_READ_VOUT, Word, Read).scaled(Scale::Centi)
            }
            Operation::DcOutputCurrent => {
                CommandSpec::new(CMD_READ_IOUT, Word, Read).scaled(Scale::Centi)
            }
            Operation::Temperature => {
                CommandSpec::new(CMD_READ_TEMPERATURE, Word, Read).scaled(Scale::Deci)
            }
            Operation::FanSpeed1 => {
                CommandSpec::new(CMD_READ_FAN_SPEED_1, Word, Read).only(PowerSupply)
            }
            Operation::FanSpeed2 => {
                CommandSpec::new(CMD_READ_FAN_SPEED_2, Word, Read).only(PowerSupply)
            }
            Operation::Manufacturer => CommandSpec::new(
                CMD_MFR_ID_B0B5,
                Text {
                    continuation: Some(CMD_MFR_ID_B6B11),
                },
                Read,
            ),
            Operation::ModelType => CommandSpec::new(
                CMD_MFR_MODEL_B0B5,
                Text {
                    continuation: Some(CMD_MFR_MODEL_B6B11),
                },
                Read,
            ),
            Operation::Firmware => CommandSpec::new(CMD_MFR_REVISION, Special, Read),
            Operation::FactoryLocation => {
                CommandSpec::new(CMD_MFR_LOCATION, Text { continuation: None }, Read)
            }
            Operation::ManufactureDate => {
                CommandSpec::new(CMD_MFR_DATE, Text { continuation: None }, Read)
            }
            Operation::SerialNumber => CommandSpec::new(
                CMD_MFR_SERIAL_B0B5,
                Text {
                    continuation: Some(CMD_MFR_SERIAL_B6B11),
                },
                Read,
            ),
            Operation::CurveConstantCurrent => CommandSpec::new(CMD_CURVE_CC, Word, ReadWrite)
                .only(Charger)
                .scaled(Scale::Centi),
            Operation::CurveConstantVoltage => CommandSpec::new(CMD_CURVE_CV, Word, ReadWrite)
                .only(Charger)
                .scaled(Scale::Centi),
            Operation::CurveFloatVoltage => CommandSpec::new(CMD_CURVE_FV, Word, ReadWrite)
                .only(Charger)
                .scaled(Scale::Centi),
            Operation::CurveTaperCurrent => CommandSpec::new(CMD_CURVE_TC, Word, ReadWrite)
                .only(Charger)
                .scaled(Scale::Centi),
            Operation::CurveConfig => {
                CommandSpec::new(CMD_CURVE_CONFIG, Word, ReadWrite).only(Charger)
            }
            Operation::CurveCcTimeout => {
                CommandSpec::new(CMD_CURVE_CC_TIMEOUT, Word, ReadWrite).only(Charger)
            }
            Operation::CurveCvTimeout => {
                CommandSpec::new(CMD_CURVE_CV_TIMEOUT, Word, ReadWrite).only(Charger)
            }
            Operation::CurveFvTimeout => {
                CommandSpec::new(CMD_CURVE_FV_TIMEOUT, Word, ReadWrite).only(Charger)
            }
            Operation::ChargeStatus => CommandSpec::new(CMD_CHG_STATUS, Word, Read).only(Charger),
            Operation::ScalingFactor => CommandSpec::new(CMD_SCALING_FACTOR, Special, Read),
            Operation::SystemStatus => CommandSpec::new(CMD_SYSTEM_STATUS, Word, Read),
            Operation::SystemConfig => CommandSpec::new(CMD_SYSTEM_CONFIG, Word, ReadWrite),
            Operation::Direction => {
                CommandSpec::new(CMD_DIRECTION_CTRL, Byte, ReadWrite).only(PowerSupply)
            }
            Operation::DischargeVoltage => CommandSpec::new(CMD_REVERSE_VOUT_SET, Word, ReadWrite)
                .only(PowerSupply)
                .clamped(LimitKind::DischargeVoltage)
                .scaled(Scale::Centi),
            Operation::DischargeCurrent => CommandSpec::new(CMD_REVERSE_IOUT_SET, Word, ReadWrite)
                .only(PowerSupply)
                .clamped(LimitKind::DischargeCurrent)
                .scaled(Scale::Centi),
            Operation::BidirectionalConfig => {
                CommandSpec::new(CMD_BIDIRECTIONAL_CONFIG, Word, ReadWrite).only(PowerSupply)
            }
        }
    }

    /// Stable snake_case name of the operation.
    pub const fn name(self) -> &'static str {
        match self {
            Operation::OutputEnable => "output_enable",
            Operation::ChargeVoltage => "charge_voltage",
            Operation::ChargeCurrent => "charge_current",
            Operation::FaultStatus => "fault_status",
            Operation::AcInputVoltage => "ac_input_voltage",
            Operation::DcOutputVoltage => "dc_output_voltage",
            Operation::DcOutputCurrent => "dc_output_current",
            Operation::Temperature => "temperature",
            Operation::FanSpeed1 => "fan_speed_1",
            Operation::FanSpeed2 => "fan_speed_2",
            Operation::Manufacturer => "manufacturer",
            Operation::ModelType => "model_type",
            Operation::Firmware => "firmware",
            Operation::FactoryLocation => "factory_location",
            Operation::ManufactureDate => "manufacture_date",
            Operation::SerialNumber => "serial_number",
            Operation::CurveConstantCurrent => "curve_cc",
            Operation::CurveConstantVoltage => "curve_cv",
            Operation::CurveFloatVoltage => "curve_fv",
            Operation::CurveTaperCurrent => "curve_tc",
            Operation::CurveConfig => "curve_config",
            Operation::CurveCcTimeout => "curve_cc_timeout",
            Operation::CurveCvTimeout => "curve_cv_timeout",
            Operation::CurveFvTimeout => "curve_fv_timeout",
            Operation::ChargeStatus => "charge_status",
            Operation::ScalingFactor => "scaling_factor",
            Operation::SystemStatus => "system_status",
            Operation::SystemConfig => "system_config",
            Operation::Direction => "direction",
            Operation::DischargeVoltage => "discharge_voltage",
            Operation::DischargeCurrent => "discharge_current",
            Operation::BidirectionalConfig => "bidirectional_config",
        }
    }

    /// Finds the operation that sends command `code`, including the second
    /// segment of two-part text reads.
    pub fn from_code(code: u16) -> Option<Operation> {
        Operation::ALL.iter().copied().find(|op| op.spec().answers_to(code))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.spec().code)
    }
}

static OPERATIONS_BY_NAME: Lazy<HashMap<&'static str, Operation>> =
    Lazy::new(|| Operation::ALL.iter().map(|op| (op.name(), *op)).collect());

impl FromStr for Operation {
    type Err = MwCanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        OPERATIONS_BY_NAME
            .get(key.as_str())
            .copied()
            .ok_or_else(|| MwCanError::Configuration(format!("unknown operation '{s}'")))
    }
}
