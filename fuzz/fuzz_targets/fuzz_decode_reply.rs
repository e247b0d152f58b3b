#![no_main]

use libfuzzer_sys::fuzz_target;
use mwcan_rs::payload::{decode_payload, decode_reply};
use mwcan_rs::{CanFrame, DeviceAddress, DeviceVariant};

fuzz_target!(|data: &[u8]| {
    // The payload decoder must reject malformed replies without panicking
    let _ = decode_payload(data);

    if data.len() >= 4 {
        let id = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let frame = CanFrame::new(id, &data[4..]);
        for (variant, node) in [(DeviceVariant::PowerSupply, 3), (DeviceVariant::Charger, 0)] {
            if let Ok(address) = DeviceAddress::resolve(variant, node) {
                let _ = decode_reply(&frame, &address);
            }
        }
    }

    // Force the 8-byte marker paths
    if data.len() >= 6 {
        for marker in [0x84u8, 0xC0] {
            let mut reply = vec![marker, 0x00];
            reply.extend_from_slice(&data[..6]);
            let _ = decode_payload(&reply);
        }
    }
});
