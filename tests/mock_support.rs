//! Shared fixtures for the session tests: a limits file with one model per family
//! and sessions wired to a `MockCanBus`.

#![allow(dead_code)]

use mwcan_rs::{DeviceAddress, DeviceProfile, DeviceSession, DeviceVariant, LimitsFile, MockCanBus};

pub const LIMITS_JSON: &str = r#"{
    "BIC-2200-24": {
        "Voltage": 24, "MaxWatt": 2200,
        "BoostChargeVoltage": 28.8, "FloatChargeVoltage": 27.6,
        "MinChargeVoltage": 19.0, "MaxChargeVoltage": 28.8,
        "MinChargeCurrent": 1.0, "MaxChargeCurrent": 65.0,
        "MinDisChargeVoltage": 19.0, "MaxDisChargeVoltage": 28.8,
        "MinDisChargeCurrent": 1.0, "MaxDisChargeCurrent": 65.0
    },
    "NPB-1200-24": {
        "Voltage": 24, "MaxWatt": 1200,
        "BoostChargeVoltage": 28.8, "FloatChargeVoltage": 27.6,
        "MinChargeVoltage": 21.0, "MaxChargeVoltage": 29.0,
        "MinChargeCurrent": 5.0, "MaxChargeCurrent": 36.0
    }
}"#;

/// Reply id of BIC-2200 node 3
pub const PSU_REPLY_ID: u32 = 0x000C_0203;
/// Reply id of NPB node 0
pub const NPB_REPLY_ID: u32 = 0x000C_0000;

pub fn limits() -> LimitsFile {
    LimitsFile::from_json(LIMITS_JSON).unwrap()
}

pub fn session(variant: DeviceVariant, node: u8, model: &str) -> (DeviceSession<MockCanBus>, MockCanBus) {
    let bus = MockCanBus::new();
    let address = DeviceAddress::resolve(variant, node).unwrap();
    let profile = DeviceProfile::new(address, model, limits().limits_for(model).unwrap()).unwrap();
    (DeviceSession::new(profile, bus.clone()), bus)
}

/// BIC-2200 at node 3
pub fn psu_session() -> (DeviceSession<MockCanBus>, MockCanBus) {
    session(DeviceVariant::PowerSupply, 3, "BIC-2200-24")
}

/// NPB at node 0
pub fn npb_session() -> (DeviceSession<MockCanBus>, MockCanBus) {
    session(DeviceVariant::Charger, 0, "NPB-1200-24")
}
