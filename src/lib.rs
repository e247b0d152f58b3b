//! # mwcan-rs - A Rust Crate for the Mean Well CAN Protocol
//!
//! The mwcan-rs crate drives Mean Well power devices over a CAN bus: the BIC-2200
//! bidirectional power supply and the NPB battery charger. Domain operations such as
//! reading the output voltage or setting the charge current are turned into fixed
//! CAN request frames for one device, and the replies, whose layout depends on the
//! command, are decoded into typed values.
//!
//! ## Features
//!
//! - Address resolution for both device families from the node id jumpers
//! - Request packing and length/marker based reply decoding
//! - A command table covering every documented operation, with variant checks
//! - Saturation of set-points into per-model limits loaded from a JSON file
//! - Symbolic decoding of fault, status, config and charge words
//! - SocketCAN transport and link bring-up (`ip link`, `slcand`)
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mwcan-rs = "0.3.0"
//! ```
//!
//! ```rust,no_run
//! use mwcan_rs::{DeviceAddress, DeviceSession, DeviceVariant, LimitsFile, SocketCanBus};
//!
//! # async fn run() -> Result<(), mwcan_rs::MwCanError> {
//! let address = DeviceAddress::resolve(DeviceVariant::Charger, 0)?;
//! let limits = LimitsFile::load("mwcan.json")?;
//! let mut session = DeviceSession::connect(address, &limits, SocketCanBus::open("can0")?).await?;
//!
//! for line in session.describe(mwcan_rs::Operation::ChargeStatus).await? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bitfield;
pub mod can;
pub mod command;
pub mod constants;
pub mod error;
pub mod logging;
pub mod payload;
pub mod profile;
pub mod session;

pub use crate::error::MwCanError;
pub use crate::logging::{init_logger, init_logger_with_level, log_info};

// Bus side
pub use can::{
    CanFrame, CanTransport, DeviceAddress, DeviceVariant, IpLink, LinkConfig, LinkControl,
    MockCanBus, SocketCanBus,
};

// Protocol
pub use command::{CommandSpec, Operation};
pub use payload::{decode_payload, decode_reply, DecodedValue, FirmwareVersion, Reply};

// Devices
pub use profile::{DeviceProfile, Limit, LimitKind, LimitSet, LimitsFile};
pub use session::{
    ChargerStrategy, DeviceSession, Direction, PowerSupplyStrategy, VariantStrategy,
};

/// Connect to the device at `node_id` on a SocketCAN interface and identify it.
///
/// # Arguments
/// * `interface` - SocketCAN interface name (e.g., "can0")
/// * `variant` - Device family
/// * `node_id` - Node id set on the device (BIC-2200 0-7, NPB 0-3)
/// * `limits` - Model limits, looked up by the model type the device reports
///
/// # Returns
/// * `Ok(DeviceSession)` - Session ready for operations
/// * `Err(MwCanError)` - Interface, addressing or profile lookup failed
pub async fn connect(
    interface: &str,
    variant: DeviceVariant,
    node_id: u8,
    limits: &LimitsFile,
) -> Result<DeviceSession<SocketCanBus>, MwCanError> {
    let address = DeviceAddress::resolve(variant, node_id)?;
    let bus = SocketCanBus::open(interface)?;
    DeviceSession::connect(address, limits, bus).await
}
