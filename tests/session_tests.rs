//! End-to-end tests of `DeviceSession` against the mock bus: request frames, reply
//! handling, sentinels, clamping and the variant rules.

mod mock_support;

use mock_support::*;
use mwcan_rs::command::Operation;
use mwcan_rs::{
    DeviceAddress, DeviceSession, DeviceVariant, Direction, FirmwareVersion, MockCanBus,
    MwCanError,
};

#[tokio::test]
async fn test_read_dc_voltage() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x60, 0x00, 0x06, 0x0A]);

    assert_eq!(session.dc_voltage().await.unwrap(), 2566);

    let sent = bus.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, 0x000C_0303);
    assert_eq!(sent[0].data, vec![0x60, 0x00]);
}

#[tokio::test]
async fn test_power_supply_current_is_signed() {
    let (mut session, bus) = psu_session();
    // 21000 = 0x5208
    bus.queue_reply(PSU_REPLY_ID, &[0x61, 0x00, 0x08, 0x52]);
    assert_eq!(session.dc_current().await.unwrap(), -44536);
}

#[tokio::test]
async fn test_power_supply_voltage_is_not_signed() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x60, 0x00, 0x08, 0x52]);
    assert_eq!(session.dc_voltage().await.unwrap(), 21000);
}

#[tokio::test]
async fn test_charger_current_is_unsigned() {
    let (mut session, bus) = npb_session();
    bus.queue_reply(NPB_REPLY_ID, &[0x61, 0x00, 0x08, 0x52]);
    assert_eq!(session.dc_current().await.unwrap(), 21000);
    assert_eq!(bus.sent()[0].id, 0x000C_0100);
}

#[tokio::test]
async fn test_timeout_yields_sentinels() {
    let (mut session, bus) = psu_session();
    assert_eq!(session.temperature().await.unwrap(), -1);
    assert_eq!(session.serial_number().await.unwrap(), "");
    // One numeric read plus two text segments
    assert_eq!(bus.timeouts(), 3);
    assert_eq!(bus.sent().len(), 3);
}

#[tokio::test]
async fn test_reply_from_other_node_behaves_like_timeout() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(0x000C_0204, &[0x60, 0x00, 0x06, 0x0A]);
    assert_eq!(session.dc_voltage().await.unwrap(), -1);

    bus.queue_reply(0x000C_0303, b"\x87\x00ABCDEF");
    bus.queue_reply(PSU_REPLY_ID, b"\x88\x00123456");
    // First segment came from the wrong id and is dropped
    assert_eq!(session.serial_number().await.unwrap(), "123456");
}

#[tokio::test]
async fn test_serial_number_concatenates_segments() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, b"\x87\x00ABCDEF");
    bus.queue_reply(PSU_REPLY_ID, b"\x88\x00123456");

    assert_eq!(session.serial_number().await.unwrap(), "ABCDEF123456");

    let sent = bus.sent();
    assert_eq!(sent[0].data, vec![0x87, 0x00]);
    assert_eq!(sent[1].data, vec![0x88, 0x00]);
}

#[tokio::test]
async fn test_missing_second_segment() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, b"\x82\x00BIC-22");
    assert_eq!(session.model_type().await.unwrap(), "BIC-22");
}

#[tokio::test]
async fn test_single_segment_text() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x86, 0x00, b'2', b'3', b'1']);
    assert_eq!(session.manufacture_date().await.unwrap(), "231");
    assert_eq!(bus.sent().len(), 1);
}

#[tokio::test]
async fn test_clamped_set_points() {
    let (mut session, bus) = psu_session();

    assert_eq!(session.set_charge_voltage(5000).await.unwrap(), 2880);
    assert_eq!(session.set_charge_voltage(1000).await.unwrap(), 1900);
    assert_eq!(session.set_charge_voltage(2566).await.unwrap(), 2566);
    assert_eq!(session.set_discharge_current(10_000).await.unwrap(), 6500);

    let sent = bus.sent();
    assert_eq!(sent[0].data, vec![0x20, 0x00, 0x40, 0x0B]);
    assert_eq!(sent[1].data, vec![0x20, 0x00, 0x6C, 0x07]);
    assert_eq!(sent[2].data, vec![0x20, 0x00, 0x06, 0x0A]);
    assert_eq!(sent[3].data, vec![0x30, 0x01, 0x64, 0x19]);
}

#[tokio::test]
async fn test_writes_do_not_wait_for_reply() {
    let (mut session, bus) = psu_session();
    session.set_output(true).await.unwrap();
    session.set_direction(Direction::Discharge).await.unwrap();
    session.set_system_config(0x0401).await.unwrap();

    assert_eq!(bus.timeouts(), 0);
    let sent = bus.sent();
    assert_eq!(sent[0].data, vec![0x00, 0x00, 0x01]);
    assert_eq!(sent[1].data, vec![0x00, 0x01, 0x01]);
    assert_eq!(sent[2].data, vec![0xC2, 0x00, 0x01, 0x04]);
}

#[tokio::test]
async fn test_unclamped_write_passes_through() {
    let (mut session, bus) = npb_session();
    assert_eq!(session.set_curve_cc(9999).await.unwrap(), 9999);
    assert_eq!(bus.sent()[0].data, vec![0xB0, 0x00, 0x0F, 0x27]);
}

#[tokio::test]
async fn test_variant_specific_operations_rejected() {
    let (mut npb, npb_bus) = npb_session();
    assert!(matches!(
        npb.set_discharge_voltage(2400).await,
        Err(MwCanError::UnsupportedCommand { operation: "discharge_voltage", .. })
    ));
    assert!(npb.fan_speed_1().await.is_err());
    assert!(npb_bus.sent().is_empty());

    let (mut psu, psu_bus) = psu_session();
    assert!(matches!(
        psu.curve_config().await,
        Err(MwCanError::UnsupportedCommand { variant: DeviceVariant::PowerSupply, .. })
    ));
    assert!(psu_bus.sent().is_empty());
}

#[tokio::test]
async fn test_write_to_read_only_operation() {
    let (mut session, _bus) = psu_session();
    assert!(matches!(
        session.write(Operation::DcOutputVoltage, 1).await,
        Err(MwCanError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_wrong_reply_shape() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x60, 0x00, b'A', b'B', b'C']);
    assert!(matches!(
        session.dc_voltage().await,
        Err(MwCanError::ProtocolDecode(_))
    ));
}

#[tokio::test]
async fn test_firmware() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x84, 0x00, 0x0A, 0x05, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(
        session.firmware().await.unwrap(),
        Some(FirmwareVersion { mcu1: 10, mcu2: 5 })
    );
    assert_eq!(session.firmware().await.unwrap(), None);
}

#[tokio::test]
async fn test_scaling_factors() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0xC0, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    assert_eq!(session.scaling_factors().await.unwrap(), 0x6655_4433_2211);
}

#[tokio::test]
async fn test_describe_system_config() {
    let (mut psu, psu_bus) = psu_session();
    psu_bus.queue_reply(PSU_REPLY_ID, &[0xC2, 0x00, 0x01, 0x00]);
    let lines = psu.describe(Operation::SystemConfig).await.unwrap();
    assert_eq!(lines[0], "BIT flags: 0b0000000000000001");
    assert!(lines[1].contains("CAN mode control enabled"));

    let (mut npb, npb_bus) = npb_session();
    npb_bus.queue_reply(NPB_REPLY_ID, &[0xC2, 0x00, 0x01, 0x00]);
    let lines = npb.describe(Operation::SystemConfig).await.unwrap();
    assert!(lines[1].ends_with("not used"));
}

#[tokio::test]
async fn test_describe_without_reply_is_empty() {
    let (mut session, _bus) = npb_session();
    assert!(session.describe(Operation::ChargeStatus).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_describe_charge_status_on_power_supply() {
    let (mut session, bus) = psu_session();
    assert!(session.describe(Operation::ChargeStatus).await.is_err());
    assert!(bus.sent().is_empty());
}

#[tokio::test]
async fn test_set_charger_mode_read_modify_write() {
    let (mut session, bus) = npb_session();
    bus.queue_reply(NPB_REPLY_ID, &[0xB4, 0x00, 0x05, 0x00]);
    bus.queue_reply(NPB_REPLY_ID, &[0xB4, 0x00, 0x85, 0x00]);

    assert_eq!(session.set_charger_mode(true).await.unwrap(), 0x85);

    let sent = bus.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].data, vec![0xB4, 0x00]);
    assert_eq!(sent[1].data, vec![0xB4, 0x00, 0x85, 0x00]);
    assert_eq!(sent[2].data, vec![0xB4, 0x00]);
}

#[tokio::test]
async fn test_set_curve_config_bit_without_reply() {
    let (mut session, bus) = npb_session();
    assert_eq!(session.set_curve_config_bit(7, false).await.unwrap(), -1);
    // Only the initial read went out
    assert_eq!(bus.sent().len(), 1);
}

#[tokio::test]
async fn test_set_curve_config_bit_outside_word() {
    let (mut session, bus) = npb_session();
    bus.queue_reply(NPB_REPLY_ID, &[0xB4, 0x00, 0x85, 0x00]);

    for bit in [16, 200] {
        assert!(matches!(
            session.set_curve_config_bit(bit, true).await,
            Err(MwCanError::Configuration(_))
        ));
    }
    assert!(bus.sent().is_empty());
}

#[tokio::test]
async fn test_set_curve_config_top_bit() {
    let (mut session, bus) = npb_session();
    bus.queue_reply(NPB_REPLY_ID, &[0xB4, 0x00, 0x85, 0x00]);
    bus.queue_reply(NPB_REPLY_ID, &[0xB4, 0x00, 0x85, 0x80]);

    assert_eq!(session.set_curve_config_bit(15, true).await.unwrap(), 0x8085);
    assert_eq!(bus.sent()[1].data, vec![0xB4, 0x00, 0x85, 0x80]);
}

#[tokio::test]
async fn test_output_enabled_byte_reply_is_base16() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x00, 0x00, 0x10]);
    bus.queue_reply(PSU_REPLY_ID, &[0x00, 0x00, 0x0A]);

    assert_eq!(session.output_enabled().await.unwrap(), 16);
    assert_eq!(session.output_enabled().await.unwrap(), 10);
}

#[tokio::test]
async fn test_reply_echoing_other_command_is_still_decoded() {
    let (mut session, bus) = psu_session();
    // Reply echoes 0x0061 to a 0x0060 request; sign correction follows the request
    bus.queue_reply(PSU_REPLY_ID, &[0x61, 0x00, 0x08, 0x52]);
    assert_eq!(session.dc_voltage().await.unwrap(), 21000);
}

#[tokio::test]
async fn test_custom_reply_timeout() {
    let (session, bus) = psu_session();
    let mut session = session.with_reply_timeout(std::time::Duration::from_millis(50));
    assert_eq!(session.temperature().await.unwrap(), -1);
    bus.queue_reply(PSU_REPLY_ID, &[0x62, 0x00, 0xFA, 0x00]);
    assert_eq!(session.temperature().await.unwrap(), 250);
}

#[tokio::test]
async fn test_describe_fault_status() {
    let (mut session, bus) = psu_session();
    bus.queue_reply(PSU_REPLY_ID, &[0x40, 0x00, 0x04, 0x00]);

    let lines = session.describe(Operation::FaultStatus).await.unwrap();
    assert_eq!(lines[0], "BIT flags: 0b0000000000000100");
    assert!(lines.contains(&"FAULT  BIT    2: DC over voltage protected".to_string()));
}

#[tokio::test]
async fn test_connect_identifies_model() {
    let bus = MockCanBus::new();
    bus.queue_reply(PSU_REPLY_ID, b"\x82\x00BIC-22");
    bus.queue_reply(PSU_REPLY_ID, b"\x83\x0000-24 ");
    let address = DeviceAddress::resolve(DeviceVariant::PowerSupply, 3).unwrap();

    let session = DeviceSession::connect(address, &limits(), bus).await.unwrap();
    assert_eq!(session.profile().model(), "BIC-2200-24");
    assert_eq!(session.profile().limits().charge_voltage.max, 2880);
}

#[tokio::test]
async fn test_connect_unknown_model() {
    let bus = MockCanBus::new();
    bus.queue_reply(PSU_REPLY_ID, b"\x82\x00BIC-22");
    bus.queue_reply(PSU_REPLY_ID, b"\x83\x0000-48 ");
    let address = DeviceAddress::resolve(DeviceVariant::PowerSupply, 3).unwrap();

    assert!(matches!(
        DeviceSession::connect(address, &limits(), bus).await,
        Err(MwCanError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_connect_without_reply() {
    let address = DeviceAddress::resolve(DeviceVariant::Charger, 0).unwrap();
    assert!(matches!(
        DeviceSession::connect(address, &limits(), MockCanBus::new()).await,
        Err(MwCanError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_transport_error_is_fatal() {
    let (mut session, bus) = psu_session();
    bus.set_next_error("bus off");
    assert!(matches!(
        session.dc_voltage().await,
        Err(MwCanError::Transport(_))
    ));
}

mod prop_tests {
    use crate::mock_support::{npb_session, psu_session};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_charge_voltage_clamp_law(value in -100_000i64..100_000) {
            let (mut session, bus) = psu_session();
            let written = tokio_test::block_on(session.set_charge_voltage(value)).unwrap();

            prop_assert_eq!(written, value.clamp(1900, 2880));
            let data = &bus.sent()[0].data;
            prop_assert_eq!(i64::from(u16::from_le_bytes([data[2], data[3]])), written);
        }

        #[test]
        fn prop_charger_current_clamp_law(value in 0i64..10_000) {
            let (mut session, _bus) = npb_session();
            let written = tokio_test::block_on(session.set_charge_current(value)).unwrap();
            prop_assert_eq!(written, value.clamp(500, 3600));
            if (500..=3600).contains(&value) {
                prop_assert_eq!(written, value);
            }
        }
    }
}
