//! The can module contains the bus side of the driver: device addressing, the typed
//! frame with request packing, the transport abstraction with its SocketCAN and mock
//! implementations, and management of the network link.

pub mod address;
pub mod frame;
pub mod link;
pub mod mock;
pub mod transport;

pub use address::{Applicability, DeviceAddress, DeviceVariant};
pub use frame::{CanFrame, Request, ValueWidth};
pub use link::{IpLink, LinkConfig, LinkControl, LinkState};
pub use mock::MockCanBus;
pub use transport::{CanTransport, SocketCanBus};
