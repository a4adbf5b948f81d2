//! 设备接口集成测试

mod common;

use common::*;
use cybergear_can::MockCanAdapter;
use cybergear_driver::{CyberGearBuilder, DriverError};
use cybergear_protocol::{
    Baud, MotionCommand, ParamValue, ProtocolError, RAW_CONFIG_MAGIC, RunMode, WireType,
};
use std::time::Duration;

#[test]
fn test_get_uid() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[1]);
    let motors = motors(&mock);

    assert_eq!(motors.get_uid(1).unwrap(), 0x1122_3344_5566_0001);

    let sent = mock.sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, 0x0000_FD01);
}

#[test]
fn test_scan_finds_only_replying_nodes() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[3, 40]);
    let motors = motors(&mock);

    assert_eq!(motors.scan_range(0..=50).unwrap(), vec![3, 40]);
    assert_eq!(mock.sent_frames().len(), 51);
}

#[test]
fn test_scan_covers_full_node_range() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[3, 40, 0x7F]);
    let motors = motors(&mock);

    assert_eq!(motors.scan().unwrap(), vec![3, 40, 0x7F]);

    let sent = mock.sent_frames();
    assert_eq!(sent.len(), 128);
    assert_eq!(request_of(&sent[0]), (0, 0));
    assert_eq!(request_of(&sent[127]), (0, 0x7F));
}

#[test]
fn test_scan_counts_malformed_reply_as_present() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        if node == 2 {
            vec![reply(0, 0, node, &[1, 2])]
        } else {
            Vec::new()
        }
    });
    let motors = motors(&mock);

    assert_eq!(motors.scan_range(0..=3).unwrap(), vec![2]);
}

#[test]
fn test_invalid_node_sends_nothing() {
    let mock = MockCanAdapter::new();
    let motors = motors(&mock);

    assert!(matches!(
        motors.enable(0x80),
        Err(DriverError::InvalidNodeId { node: 0x80 })
    ));
    assert!(matches!(
        motors.read_param(0xFF, "run_mode"),
        Err(DriverError::InvalidNodeId { node: 0xFF })
    ));
    assert!(matches!(
        motors.change_id(1, 0x80),
        Err(DriverError::InvalidNodeId { node: 0x80 })
    ));
    assert!(mock.sent_frames().is_empty());
}

#[test]
fn test_enable_disable_zero() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[5]);
    let motors = motors(&mock);

    let feedback = motors.enable(5).unwrap();
    assert_eq!(feedback.node, 5);
    assert!((feedback.temperature - 25.0).abs() < 0.01);
    motors.disable(5, true).unwrap();
    motors.set_zero(5).unwrap();

    let sent = mock.sent_frames();
    assert_eq!(sent[0].id, 0x0300_FD05);
    assert_eq!(sent[1].id, 0x0400_FD05);
    assert_eq!(sent[1].data[0], 1);
    assert_eq!(sent[2].id, 0x0600_FD05);
    assert_eq!(sent[2].data[0], 1);
}

#[test]
fn test_control_frame_layout() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[1]);
    let motors = motors(&mock);

    let feedback = motors
        .control(1, MotionCommand::new(0.0, 0.0, 0.0, 500.0, 0.0))
        .unwrap();
    assert!(feedback.position.abs() < 0.001);

    let sent = mock.sent_frames();
    let (command, node) = request_of(&sent[0]);
    assert_eq!((command, node), (1, 1));
    // option 携带力矩（0 N·m 位于量程中点）
    assert_eq!(sent[0].arbitration_id().option(), 0x8000);
    assert_eq!(&sent[0].data[4..6], &0xFFFFu16.to_be_bytes());
}

#[test]
fn test_change_id_reply_from_new_node() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let new_node = frame.arbitration_id().status_byte();
        vec![uid_frame(new_node, 0xBEEF)]
    });
    let motors = motors(&mock);

    assert_eq!(motors.change_id(1, 0x0A).unwrap(), 0xBEEF);
    assert_eq!(mock.sent_frames()[0].id, 0x070A_FD01);
}

#[test]
fn test_change_id_unexpected_reply() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let new_node = frame.arbitration_id().status_byte();
        vec![feedback_frame(new_node)]
    });
    let motors = motors(&mock);

    assert!(matches!(
        motors.change_id(1, 0x0A),
        Err(DriverError::UnexpectedReply {
            node: 0x0A,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn test_set_baud() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[1]);
    let motors = motors(&mock);

    motors.set_baud(1, Baud::Kbps500).unwrap();
    let sent = mock.sent_frames();
    assert_eq!(request_of(&sent[0]), (22, 1));
    assert_eq!(sent[0].data[0], 2);
}

#[test]
fn test_set_baud_invalid_selector_sends_nothing() {
    let mock = MockCanAdapter::new();
    let motors = motors(&mock);

    assert!(matches!(
        motors.set_baud_selector(1, 9),
        Err(DriverError::InvalidBaud(9))
    ));
    assert!(matches!(
        motors.set_baud_selector(1, 0),
        Err(DriverError::InvalidBaud(0))
    ));
    assert!(mock.sent_frames().is_empty());
}

#[test]
fn test_read_string_parameter() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        let code = code_of(frame);
        vec![
            config_chunk(node, code, 0x0A, 0, b"AB"),
            config_chunk(node, code, 0x0A, 1, b"CD"),
            config_chunk(node, code, 0x0A, 2, b"\0\0"),
        ]
    });
    let motors = motors(&mock);

    let (descriptor, value) = motors.read_param(1, "Name").unwrap();
    assert_eq!(descriptor.code, 0x0000);
    assert_eq!(value, ParamValue::Str("ABCD".into()));

    let sent = mock.sent_frames();
    assert_eq!(request_of(&sent[0]), (9, 1));
    assert_eq!(code_of(&sent[0]), 0x0000);
}

#[test]
fn test_read_string_twice_with_padding_after_nul() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        let code = code_of(frame);
        vec![
            config_chunk(node, code, 0x0A, 0, b"Cybe"),
            config_chunk(node, code, 0x0A, 1, b"rG\0\0"),
            config_chunk(node, code, 0x0A, 2, b"\0\0\0\0"),
        ]
    });
    let motors = motors(&mock);

    let (_, first) = motors.read_param(1, "Name").unwrap();
    assert_eq!(first.as_str(), Some("CyberG"));
    assert_eq!(mock.pending_rx(), 0);

    let (_, second) = motors.read_param(1, "Name").unwrap();
    assert_eq!(second.as_str(), Some("CyberG"));
    assert_eq!(mock.pending_rx(), 0);
    assert_eq!(motors.metrics().stray_frames, 0);
}

#[test]
fn test_read_string_partial_on_deadline() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        vec![config_chunk(node, code_of(frame), 0x0A, 0, b"1.2.")]
    });
    let motors = motors(&mock);

    let (_, value) = motors.read_param(1, 0x1003u16).unwrap();
    assert_eq!(value.as_str(), Some("1.2."));
}

#[test]
fn test_read_parameter_space() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        let code = code_of(frame);
        let mut data = [0u8; 8];
        data[0..2].copy_from_slice(&code.to_le_bytes());
        data[4..8].copy_from_slice(&12.5f32.to_le_bytes());
        vec![reply(17, 0, node, &data)]
    });
    let motors = motors(&mock);

    let (descriptor, value) = motors.read_param(1, "limit_spd_2").unwrap();
    assert_eq!(descriptor.code, 0x7017);
    assert_eq!(value, ParamValue::F32(12.5));
    assert_eq!(request_of(&mock.sent_frames()[0]), (17, 1));
}

#[test]
fn test_read_timeout() {
    let mock = MockCanAdapter::new();
    let motors = motors(&mock);

    assert!(motors.read_param(1, "CAN_ID").unwrap_err().is_timeout());
    assert!(motors.read_param(1, "run_mode").unwrap_err().is_timeout());
}

#[test]
fn test_unknown_parameter() {
    let mock = MockCanAdapter::new();
    let motors = motors(&mock);

    assert!(matches!(
        motors.read_param(1, "no_such_param"),
        Err(DriverError::UnknownParameter(_))
    ));
    assert!(matches!(
        motors.set_param(1, 0x7FFFu16, 1.0),
        Err(DriverError::UnknownParameter(_))
    ));
    assert!(mock.sent_frames().is_empty());
}

#[test]
fn test_write_param_frame() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[1]);
    let motors = motors(&mock);

    motors.set_param(1, "spd_ref", 2.5).unwrap();
    let sent = mock.sent_frames();
    assert_eq!(request_of(&sent[0]), (18, 1));
    assert_eq!(sent[0].arbitration_id().option(), HOST as u16);
    assert_eq!(code_of(&sent[0]), 0x700a);
    assert_eq!(&sent[0].data[4..8], &2.5f32.to_le_bytes());
}

#[test]
fn test_write_param_rejects_strings_and_type_mismatch() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[1]);
    let motors = motors(&mock);

    assert!(matches!(
        motors.write_param(1, "Name", ParamValue::Str("x".into())),
        Err(DriverError::Protocol(ProtocolError::NotWritable(WireType::Str)))
    ));
    assert!(matches!(
        motors.write_param(1, "spd_ref", ParamValue::U8(1)),
        Err(DriverError::InvalidInput(_))
    ));
    assert!(matches!(
        motors.set_param(1, "run_mode", 300.0),
        Err(DriverError::Protocol(ProtocolError::ValueOutOfRange { .. }))
    ));
    assert!(mock.sent_frames().is_empty());
}

#[test]
fn test_set_run_mode_disables_first() {
    let mock = MockCanAdapter::new();
    install_motors(&mock, &[1]);
    let motors = motors(&mock);

    motors.set_run_mode(1, RunMode::Speed).unwrap();

    let sent = mock.sent_frames();
    assert_eq!(sent.len(), 2);
    assert_eq!(request_of(&sent[0]), (4, 1));
    assert_eq!(sent[0].data[0], 0);
    assert_eq!(request_of(&sent[1]), (18, 1));
    assert_eq!(code_of(&sent[1]), 0x7005);
    assert_eq!(sent[1].data[4], 2);
}

#[test]
fn test_set_run_mode_skips_write_when_disable_fails() {
    let mock = MockCanAdapter::new();
    let motors = motors(&mock);

    assert!(motors.set_run_mode(1, RunMode::Current).unwrap_err().is_timeout());
    assert_eq!(mock.sent_frames().len(), 1);
}

fn raw_chunk(node: u8, terminal: bool, seq: u8, payload: &[u8]) -> cybergear_can::CgFrame {
    let mut data = vec![seq, 0];
    data.extend_from_slice(payload);
    reply(19, if terminal { 0x09 } else { 0 }, node, &data)
}

#[test]
fn test_raw_config_dump() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        vec![
            raw_chunk(node, false, 0, &[1, 2, 3, 4, 5, 6]),
            raw_chunk(node, false, 1, &[7, 8, 9, 10, 11, 12]),
            raw_chunk(node, true, 2, &[0; 6]),
        ]
    });
    let motors = motors(&mock);

    let dump = motors.read_raw_config(1).unwrap();
    assert!(dump.complete);
    assert_eq!(dump.bytes, (1..=12).collect::<Vec<u8>>());
    assert_eq!(mock.sent_frames()[0].data, RAW_CONFIG_MAGIC);
}

#[test]
fn test_raw_config_dump_partial_and_empty() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (_, node) = request_of(frame);
        if node == 1 {
            vec![raw_chunk(node, false, 0, &[9, 9, 9, 9, 9, 9])]
        } else {
            Vec::new()
        }
    });
    let motors = motors(&mock);

    let dump = motors.read_raw_config(1).unwrap();
    assert!(!dump.complete);
    assert_eq!(dump.bytes, vec![9; 6]);

    assert!(motors.read_raw_config(2).unwrap_err().is_timeout());
}

#[test]
fn test_dump_reports_per_parameter_results() {
    let mock = MockCanAdapter::new();
    mock.set_responder(|frame| {
        let (command, node) = request_of(frame);
        let code = code_of(frame);
        match (command, code) {
            (9, 0x200a) => vec![config_chunk(node, code, 0x00, 0, &[1, 0, 0, 0])],
            _ => Vec::new(),
        }
    });
    let motors = CyberGearBuilder::new()
        .adapter(mock.clone())
        .config({
            let mut config = fast_config();
            config.reply_timeout = Duration::from_millis(1);
            config.config_read_timeout = Duration::from_millis(1);
            config
        })
        .build()
        .unwrap();

    let results = motors.dump(1).unwrap();
    assert_eq!(results.len(), cybergear_protocol::PARAMETERS.len());
    let (_, can_id) = results
        .iter()
        .find(|(descriptor, _)| descriptor.name == "CAN_ID")
        .unwrap();
    assert_eq!(can_id.as_ref().unwrap(), &ParamValue::U8(1));
    assert!(
        results
            .iter()
            .filter(|(descriptor, _)| descriptor.code != 0x200a)
            .all(|(_, result)| result.as_ref().is_err_and(DriverError::is_timeout))
    );
}

#[test]
fn test_dump_stops_on_cancel() {
    let mock = MockCanAdapter::new();
    let motors = motors(&mock);
    motors.cancel_token().cancel();

    assert!(matches!(motors.dump(1), Err(DriverError::Cancelled)));
    assert!(mock.sent_frames().is_empty());
}
