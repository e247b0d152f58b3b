//! # Status and Configuration Words
//!
//! The fault status, system status, system config, curve config and charge status
//! commands return 16-bit words whose bits (or 2-bit groups) carry individual flags.
//! Their meaning differs between the BIC-2200 and the NPB, and some words only exist
//! on the NPB.
//!
//! Two views are offered:
//! - [`decode`] renders a word against one of the constant [`BitFieldTable`]s into
//!   human readable lines, e.g. `"FAULT  BIT  0: FAN locked"`;
//! - the `bitflags` types ([`FaultFlags`], [`SystemStatusFlags`], ...) give typed
//!   access for programmatic checks.
//!
//! ```rust
//! use mwcan_rs::bitfield::{decode, SYSTEM_CONFIG};
//! use mwcan_rs::DeviceVariant;
//!
//! let lines = decode(&SYSTEM_CONFIG, 0b001, DeviceVariant::Charger);
//! assert_eq!(lines[0], "CONFIG BIT    0: not used");
//! ```

use crate::can::address::{Applicability, DeviceVariant};
use bitflags::bitflags;

const PS: Applicability = Applicability::Only(DeviceVariant::PowerSupply);
const NPB: Applicability = Applicability::Only(DeviceVariant::Charger);
const ALL: Applicability = Applicability::All;

/// Text rendered for bits without a meaning on the current variant.
pub const NOT_USED: &str = "not used";

/// Position of an entry inside the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bits {
    /// A single bit
    One(u8),
    /// Two adjacent bits, the lower one given
    Two(u8),
}

impl Bits {
    /// Extracts the field value from `word`.
    pub fn extract(self, word: u16) -> usize {
        match self {
            Bits::One(bit) => usize::from((word >> bit) & 0b1),
            Bits::Two(low) => usize::from((word >> low) & 0b11),
        }
    }

    fn label(self) -> String {
        match self {
            Bits::One(bit) => format!("{bit:>4}"),
            Bits::Two(low) => format!("{:>2}-{}", low + 1, low),
        }
    }
}

/// How an entry shows up on a variant it does not apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elsewhere {
    /// Rendered as [`NOT_USED`]
    NotUsed,
    /// Left out
    Omitted,
}

/// One bit or bit group of a table.
#[derive(Debug, Clone, Copy)]
pub struct BitFieldEntry {
    pub bits: Bits,
    pub applies_to: Applicability,
    /// Meaning per field value; empty for reserved bits.
    pub meanings: &'static [&'static str],
    pub elsewhere: Elsewhere,
}

impl BitFieldEntry {
    const fn new(bits: Bits, applies_to: Applicability, meanings: &'static [&'static str]) -> Self {
        BitFieldEntry {
            bits,
            applies_to,
            meanings,
            elsewhere: Elsewhere::NotUsed,
        }
    }

    const fn bit(bit: u8, applies_to: Applicability, meanings: &'static [&'static str; 2]) -> Self {
        Self::new(Bits::One(bit), applies_to, meanings)
    }

    const fn pair(low: u8, applies_to: Applicability, meanings: &'static [&'static str; 4]) -> Self {
        Self::new(Bits::Two(low), applies_to, meanings)
    }

    const fn reserved(bit: u8) -> Self {
        Self::new(Bits::One(bit), ALL, &[])
    }

    const fn omitted_elsewhere(mut self) -> Self {
        self.elsewhere = Elsewhere::Omitted;
        self
    }

    fn describe(&self, word: u16, variant: DeviceVariant) -> Option<&'static str> {
        if !self.applies_to.includes(variant) {
            return match self.elsewhere {
                Elsewhere::NotUsed => Some(NOT_USED),
                Elsewhere::Omitted => None,
            };
        }
        Some(
            self.meanings
                .get(self.bits.extract(word))
                .copied()
                .unwrap_or(NOT_USED),
        )
    }
}

/// A constant description of one status or configuration word.
#[derive(Debug)]
pub struct BitFieldTable {
    pub name: &'static str,
    /// Line prefix, padded like the device manual's register names
    pub prefix: &'static str,
    /// Variants the word exists on; other variants decode to nothing
    pub applies_to: Applicability,
    pub entries: &'static [BitFieldEntry],
}

/// Renders `word` against `table` for `variant`, one line per entry.
pub fn decode(table: &BitFieldTable, word: u16, variant: DeviceVariant) -> Vec<String> {
    if !table.applies_to.includes(variant) {
        return Vec::new();
    }

    let mut lines = Vec::new();
    for entry in table.entries {
        // Entries with variant-specific meanings appear once per variant; only the
        // applicable one may render for a position shared with a sibling entry.
        if !entry.applies_to.includes(variant) && has_sibling_for(table, entry, variant) {
            continue;
        }
        if let Some(text) = entry.describe(word, variant) {
            lines.push(format!("{} BIT {}: {}", table.prefix, entry.bits.label(), text));
        }
    }
    lines
}

fn has_sibling_for(table: &BitFieldTable, entry: &BitFieldEntry, variant: DeviceVariant) -> bool {
    table
        .entries
        .iter()
        .any(|other| other.bits == entry.bits && other.applies_to.includes(variant))
}

/// The word as a binary literal, e.g. `"BIT flags: 0b0000000000000101"`.
pub fn format_bits(word: u16) -> String {
    format!("BIT flags: {word:#018b}")
}

/// Number of bits in a status or configuration word.
pub const WORD_BITS: u8 = 16;

/// Mask of `bit`, empty for positions outside the word.
fn bit_mask(bit: u8) -> u16 {
    1u16.checked_shl(u32::from(bit)).unwrap_or(0)
}

/// Sets `bit`; positions of 16 and above leave the word unchanged.
pub fn set_bit(value: u16, bit: u8) -> u16 {
    value | bit_mask(bit)
}

pub fn clear_bit(value: u16, bit: u8) -> u16 {
    value & !bit_mask(bit)
}

pub fn is_bit(value: u16, bit: u8) -> bool {
    value & bit_mask(bit) != 0
}

// ----------------------------------------------------------------------------
// Tables
// ----------------------------------------------------------------------------

pub static FAULT_STATUS: BitFieldTable = BitFieldTable {
    name: "fault status",
    prefix: "FAULT ",
    applies_to: ALL,
    entries: &[
        BitFieldEntry::bit(0, PS, &["FAN working normally", "FAN locked"]),
        BitFieldEntry::bit(1, ALL, &["Internal temperature normal", "Internal temperature abnormal"]),
        BitFieldEntry::bit(2, ALL, &["DC voltage normal", "DC over voltage protected"]),
        BitFieldEntry::bit(3, ALL, &["DC current normal", "DC over current protected"]),
        BitFieldEntry::bit(4, ALL, &["Shorted circuit do not exist", "Output shorted circuit protected"]),
        BitFieldEntry::bit(5, ALL, &["AC main normal", "AC abnormal protection"]),
        BitFieldEntry::bit(6, ALL, &["Output/DC turned on", "Output/DC turned off"]),
        BitFieldEntry::bit(7, ALL, &["Internal temperature normal", "Internal temperature too high"]),
        BitFieldEntry::bit(8, PS, &["HV voltage normal", "HV over voltage protected"])
            .omitted_elsewhere(),
    ],
};

pub static SYSTEM_STATUS: BitFieldTable = BitFieldTable {
    name: "system status",
    prefix: "STATUS",
    applies_to: ALL,
    entries: &[
        BitFieldEntry::bit(0, PS, &["Current device is Slave", "Current device is Master"]),
        BitFieldEntry::bit(
            1,
            PS,
            &[
                "Secondary DD output voltage status TOO LOW",
                "Secondary DD output voltage status NORMAL",
            ],
        ),
        BitFieldEntry::bit(1, NPB, &["DC output at a normal range", "DC output too low"]),
        BitFieldEntry::bit(2, PS, &["Primary PFC OFF or abnormal", "Primary PFC ON normally"]),
        BitFieldEntry::reserved(3),
        BitFieldEntry::bit(
            4,
            PS,
            &["Active dummy load off/function not supported", "Active dummy load on"],
        ),
        BitFieldEntry::bit(5, PS, &["In initialization status", "NOT in initialization status"]),
        BitFieldEntry::bit(5, NPB, &["NOT in initialization status", "In initialization status"]),
        BitFieldEntry::bit(6, ALL, &["EEPROM data access normal", "EEPROM data access error"]),
        BitFieldEntry::reserved(7),
    ],
};

pub static SYSTEM_CONFIG: BitFieldTable = BitFieldTable {
    name: "system config",
    prefix: "CONFIG",
    applies_to: ALL,
    entries: &[
        BitFieldEntry::bit(
            0,
            PS,
            &[
                "CAN mode control disabled, output voltage/current defined by SVR",
                "CAN mode control enabled, output voltage, current and ON/OFF defined by CAN",
            ],
        ),
        BitFieldEntry::pair(
            1,
            ALL,
            &[
                "Power OFF, pre-set 0x00 (OFF)",
                "Power ON, pre-set 0x01 (ON)",
                "Pre-set is previous set value",
                "not used, reserved",
            ],
        ),
        BitFieldEntry::pair(
            8,
            ALL,
            &[
                "Immediate. Changes to parameters are written to EEPROM (default)",
                "1 minute delay. Write changes to EEPROM if all parameters remain unchanged for 1 minute",
                "10 minute delay. Write changes to EEPROM if all parameters remain unchanged for 10 minutes",
                "not used, reserved",
            ],
        ),
        BitFieldEntry::bit(
            10,
            ALL,
            &[
                "Enable. Parameters to be saved into EEPROM (default)",
                "Disable. Parameters NOT to be saved into EEPROM",
            ],
        ),
    ],
};

pub static CURVE_CONFIG: BitFieldTable = BitFieldTable {
    name: "curve config",
    prefix: "CURVE ",
    applies_to: NPB,
    entries: &[
        BitFieldEntry::pair(
            0,
            ALL,
            &[
                "CUVS  Customized charging curve (default)",
                "CUVS  Preset charging curve 1",
                "CUVS  Preset charging curve 2",
                "CUVS  Preset charging curve 3",
            ],
        ),
        BitFieldEntry::pair(
            2,
            ALL,
            &[
                "TCS   disable",
                "TCS   -3mV/°C/cell (default)",
                "TCS   -4mV/°C/cell",
                "TCS   -5mV/°C/cell",
            ],
        ),
        BitFieldEntry::bit(6, ALL, &["STGS  3 stage charging (default)", "STGS  2 stage charging"]),
        BitFieldEntry::bit(
            7,
            ALL,
            &["CUVE  Disabled, power supply mode", "CUVE  Enabled, charger mode (default)"],
        ),
        BitFieldEntry::bit(8, ALL, &["CCTOE Disabled", "CCTOE Enabled"]),
        BitFieldEntry::bit(9, ALL, &["CVTOE Disabled", "CVTOE Enabled"]),
        BitFieldEntry::bit(10, ALL, &["FVTOE Disabled", "FVTOE Enabled"]),
        BitFieldEntry::bit(11, ALL, &["RSTE  Disabled", "RSTE  Enabled"]),
    ],
};

pub static CHARGE_STATUS: BitFieldTable = BitFieldTable {
    name: "charge status",
    prefix: "CHG   ",
    applies_to: NPB,
    entries: &[
        BitFieldEntry::bit(0, ALL, &["Not fully charged", "Fully charged"]),
        BitFieldEntry::bit(
            1,
            ALL,
            &["The charger NOT in constant current mode", "The charger in constant current mode"],
        ),
        BitFieldEntry::bit(
            2,
            ALL,
            &["The charger NOT in constant voltage mode", "The charger in constant voltage mode"],
        ),
        BitFieldEntry::bit(3, ALL, &["The charger NOT in float mode", "The charger in float mode"]),
        BitFieldEntry::reserved(4),
        BitFieldEntry::reserved(5),
        BitFieldEntry::bit(6, ALL, &["Wake up finished", "Wake up not finished"]),
        BitFieldEntry::reserved(7),
        BitFieldEntry::reserved(8),
        BitFieldEntry::reserved(9),
        BitFieldEntry::bit(
            10,
            ALL,
            &[
                "NO short-circuit in the circuitry of temperature compensation",
                "The circuitry of temperature compensation has short-circuited",
            ],
        ),
        BitFieldEntry::bit(11, ALL, &["Battery detected", "Battery NOT detected"]),
        BitFieldEntry::reserved(12),
        BitFieldEntry::bit(
            13,
            ALL,
            &["NO time out in constant current mode", "Constant current mode time out"],
        ),
        BitFieldEntry::bit(
            14,
            ALL,
            &["NO time out in constant voltage mode", "Constant voltage mode time out"],
        ),
        BitFieldEntry::bit(15, ALL, &["NO time out in float mode", "Float mode timed out"]),
    ],
};

// ----------------------------------------------------------------------------
// Typed views
// ----------------------------------------------------------------------------

bitflags! {
    /// FAULT_STATUS (0x0040)
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FaultFlags: u16 {
        const FAN_FAIL = 1 << 0;
        const OTP      = 1 << 1;
        const OVP      = 1 << 2;
        const OLP      = 1 << 3;
        const SHORT    = 1 << 4;
        const AC_FAIL  = 1 << 5;
        const OP_OFF   = 1 << 6;
        const HI_TEMP  = 1 << 7;
        const HV_OVP   = 1 << 8;
    }
}

bitflags! {
    /// SYSTEM_STATUS (0x00C1)
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SystemStatusFlags: u16 {
        const M_S           = 1 << 0;
        const DC_OK         = 1 << 1;
        const PFC_OK        = 1 << 2;
        const ADL_ON        = 1 << 4;
        const INITIAL_STATE = 1 << 5;
        const EEPER         = 1 << 6;
    }
}

bitflags! {
    /// CURVE_CONFIG (0x00B4), NPB only
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CurveConfigFlags: u16 {
        const CUVS  = 0b11 << 0;
        const TCS   = 0b11 << 2;
        const STGS  = 1 << 6;
        const CUVE  = 1 << 7;
        const CCTOE = 1 << 8;
        const CVTOE = 1 << 9;
        const FVTOE = 1 << 10;
        const RSTE  = 1 << 11;
    }
}

bitflags! {
    /// CHG_STATUS (0x00B8), NPB only
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ChargeStatusFlags: u16 {
        const FULLM       = 1 << 0;
        const CCM         = 1 << 1;
        const CVM         = 1 << 2;
        const FVM         = 1 << 3;
        const WAKEUP_STOP = 1 << 6;
        const NTCER       = 1 << 10;
        const BTNC        = 1 << 11;
        const CCTOF       = 1 << 13;
        const CVTOF       = 1 << 14;
        const FVTOF       = 1 << 15;
    }
}

/// Bit position of CUVE in the curve config word; cleared selects power supply mode.
pub const CURVE_CONFIG_CUVE: u8 = CurveConfigFlags::CUVE.bits().trailing_zeros() as u8;

/// Fault flags set in `word` that the variant actually reports. The charger does
/// not use bit 0 and has no HV over-voltage bit.
pub fn active_faults(word: u16, variant: DeviceVariant) -> FaultFlags {
    let mut faults = FaultFlags::from_bits_truncate(word);
    if variant == DeviceVariant::Charger {
        faults.remove(FaultFlags::FAN_FAIL | FaultFlags::HV_OVP);
    }
    faults
}
