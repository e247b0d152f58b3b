//! # Device Addressing
//!
//! Every Mean Well CAN device listens on an extended arbitration id made of a family
//! base plus the node id selected on its jumper block, and answers from the sibling id
//! with the command-class bit (0x100) cleared:
//!
//! | Variant     | Write id      | Reply id      | Node ids |
//! |-------------|---------------|---------------|----------|
//! | PowerSupply | `0x000C03xx`  | `0x000C02xx`  | 0-7      |
//! | Charger     | `0x000C01xx`  | `0x000C00xx`  | 0-3      |
//!
//! ```rust
//! use mwcan_rs::can::address::{DeviceAddress, DeviceVariant};
//!
//! let addr = DeviceAddress::resolve(DeviceVariant::PowerSupply, 3).unwrap();
//! assert_eq!(addr.write_id(), 0x000C0303);
//! assert_eq!(addr.expected_reply_prefix(), "000c0203");
//! ```

use crate::constants::{
    CHARGER_MAX_NODE, CHARGER_WRITE_BASE, POWER_SUPPLY_MAX_NODE, POWER_SUPPLY_WRITE_BASE,
    REPLY_CLASS_BIT,
};
use crate::error::MwCanError;
use std::fmt;
use std::str::FromStr;

/// The two supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceVariant {
    /// BIC-2200 bidirectional power supply
    PowerSupply,
    /// NPB battery charger
    Charger,
}

impl DeviceVariant {
    /// Write arbitration id base of the family.
    pub fn write_base(self) -> u32 {
        match self {
            DeviceVariant::PowerSupply => POWER_SUPPLY_WRITE_BASE,
            DeviceVariant::Charger => CHARGER_WRITE_BASE,
        }
    }

    /// Highest node id the family can be jumpered to.
    pub fn max_node_id(self) -> u8 {
        match self {
            DeviceVariant::PowerSupply => POWER_SUPPLY_MAX_NODE,
            DeviceVariant::Charger => CHARGER_MAX_NODE,
        }
    }
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceVariant::PowerSupply => write!(f, "BIC-2200"),
            DeviceVariant::Charger => write!(f, "NPB"),
        }
    }
}

impl FromStr for DeviceVariant {
    type Err = MwCanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bic2200" | "bic-2200" | "bic" | "power-supply" | "powersupply" | "psu" | "0" => {
                Ok(DeviceVariant::PowerSupply)
            }
            "npb" | "charger" | "1" => Ok(DeviceVariant::Charger),
            other => Err(MwCanError::Configuration(format!(
                "unknown device variant '{other}'"
            ))),
        }
    }
}

/// Which variants a command or bit-field entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    All,
    Only(DeviceVariant),
}

impl Applicability {
    pub fn includes(self, variant: DeviceVariant) -> bool {
        match self {
            Applicability::All => true,
            Applicability::Only(v) => v == variant,
        }
    }
}

/// Resolved address of one device instance on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    variant: DeviceVariant,
    node_id: u8,
    write_id: u32,
    reply_id: u32,
    reply_prefix: String,
}

impl DeviceAddress {
    /// Derives the write id and the expected reply fingerprint for a node.
    ///
    /// Fails with [`MwCanError::Configuration`] when `node_id` is outside the range
    /// the variant's jumper block can express.
    pub fn resolve(variant: DeviceVariant, node_id: u8) -> Result<Self, MwCanError> {
        if node_id > variant.max_node_id() {
            return Err(MwCanError::Configuration(format!(
                "node id {node_id} out of range for {variant} (0-{})",
                variant.max_node_id()
            )));
        }

        let write_id = variant.write_base() | u32::from(node_id);
        let reply_id = write_id & !REPLY_CLASS_BIT;

        Ok(DeviceAddress {
            variant,
            node_id,
            write_id,
            reply_id,
            reply_prefix: format_id(reply_id),
        })
    }

    pub fn variant(&self) -> DeviceVariant {
        self.variant
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Arbitration id of every outbound frame.
    pub fn write_id(&self) -> u32 {
        self.write_id
    }

    /// Arbitration id replies are expected from.
    pub fn reply_id(&self) -> u32 {
        self.reply_id
    }

    /// Lowercase hex text of the reply id, e.g. `"000c0203"`.
    pub fn expected_reply_prefix(&self) -> &str {
        &self.reply_prefix
    }

    /// True if a frame with this arbitration id is a reply from our device.
    pub fn accepts(&self, frame_id: u32) -> bool {
        format_id(frame_id) == self.reply_prefix
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} node {} (tx 0x{:08X}, rx {})",
            self.variant, self.node_id, self.write_id, self.reply_prefix
        )
    }
}

/// Formats an extended arbitration id the way SocketCAN tools print it.
pub fn format_id(id: u32) -> String {
    format!("{id:08x}")
}
