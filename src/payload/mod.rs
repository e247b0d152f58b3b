//! The payload module turns reply frames into typed values: shape-based reply
//! decoding and the value types it produces.

pub mod reply;
pub mod value;

pub use reply::{decode_payload, decode_reply, Reply};
pub use value::{to_centi, DecodedValue, FirmwareVersion};
