//! Tests for the status and configuration word decoding.

use mwcan_rs::bitfield::{
    decode, ChargeStatusFlags, FaultFlags, SystemStatusFlags, CHARGE_STATUS, CURVE_CONFIG,
    FAULT_STATUS, SYSTEM_CONFIG, SYSTEM_STATUS,
};
use mwcan_rs::DeviceVariant;

#[test]
fn test_system_config_can_mode() {
    let psu = decode(&SYSTEM_CONFIG, 0b001, DeviceVariant::PowerSupply);
    assert!(psu[0].contains("CAN mode control enabled"));

    let npb = decode(&SYSTEM_CONFIG, 0b001, DeviceVariant::Charger);
    assert!(npb[0].ends_with(": not used"));
}

#[test]
fn test_fault_status_all_clear() {
    let lines = decode(&FAULT_STATUS, 0, DeviceVariant::PowerSupply);
    assert!(lines.iter().any(|l| l.ends_with("FAN working normally")));
    assert!(lines.iter().any(|l| l.ends_with("AC main normal")));
    assert!(lines.iter().all(|l| l.starts_with("FAULT  BIT")));
}

#[test]
fn test_charge_status_charger() {
    let word = (ChargeStatusFlags::FULLM | ChargeStatusFlags::BTNC).bits();
    let lines = decode(&CHARGE_STATUS, word, DeviceVariant::Charger);
    assert_eq!(lines[0], "CHG    BIT    0: Fully charged");
    assert!(lines.contains(&"CHG    BIT   11: Battery NOT detected".to_string()));
    assert_eq!(lines.iter().filter(|l| l.ends_with("not used")).count(), 6);
}

#[test]
fn test_charge_status_power_supply_yields_nothing() {
    assert!(decode(&CHARGE_STATUS, 0x1234, DeviceVariant::PowerSupply).is_empty());
}

#[test]
fn test_flag_views_match_tables() {
    let word = (FaultFlags::OTP | FaultFlags::AC_FAIL).bits();
    let lines = decode(&FAULT_STATUS, word, DeviceVariant::Charger);
    assert!(lines.contains(&"FAULT  BIT    1: Internal temperature abnormal".to_string()));
    assert!(lines.contains(&"FAULT  BIT    5: AC abnormal protection".to_string()));

    let status = SystemStatusFlags::from_bits_truncate(0x0041);
    assert!(status.contains(SystemStatusFlags::M_S | SystemStatusFlags::EEPER));
}

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_line_count_independent_of_word(word in any::<u16>()) {
            for table in [&FAULT_STATUS, &SYSTEM_STATUS, &SYSTEM_CONFIG, &CURVE_CONFIG, &CHARGE_STATUS] {
                for variant in [DeviceVariant::PowerSupply, DeviceVariant::Charger] {
                    prop_assert_eq!(
                        decode(table, word, variant).len(),
                        decode(table, 0, variant).len()
                    );
                }
            }
        }

        #[test]
        fn prop_decode_is_pure(word in any::<u16>(), other in any::<u16>()) {
            let first = decode(&SYSTEM_STATUS, word, DeviceVariant::PowerSupply);
            let _ = decode(&SYSTEM_STATUS, other, DeviceVariant::Charger);
            prop_assert_eq!(first, decode(&SYSTEM_STATUS, word, DeviceVariant::PowerSupply));
        }
    }
}
