//! 集成测试公共设施
//!
//! 用 `MockCanAdapter` 的应答生成器模拟总线上的电机。

#![allow(dead_code)]

use cybergear_can::{CgFrame, MockCanAdapter};
use cybergear_driver::{CancelToken, CyberGear, TransactionConfig};
use cybergear_protocol::ArbitrationId;
use std::time::Duration;

pub const HOST: u8 = 0xFD;

/// 缩短超时，让不存在的节点很快超时
pub fn fast_config() -> TransactionConfig {
    let mut config = TransactionConfig::default().with_reply_timeout(Duration::from_millis(5));
    config.config_read_timeout = Duration::from_millis(20);
    config.raw_dump_timeout = Duration::from_millis(20);
    config.flush_limit = Duration::from_millis(10);
    config
}

pub fn motors(mock: &MockCanAdapter) -> CyberGear {
    CyberGear::with_config(mock.clone(), fast_config(), CancelToken::new())
}

/// 构建应答帧：option = status << 8 | node
pub fn reply(command: u8, status: u8, node: u8, data: &[u8]) -> CgFrame {
    let option = ((status as u16) << 8) | node as u16;
    CgFrame::new_extended(ArbitrationId::from_parts(command, option, HOST).raw(), data)
}

/// 请求帧的 (通信类型, 目标节点)
pub fn request_of(frame: &CgFrame) -> (u8, u8) {
    let id = frame.arbitration_id();
    (id.command().value(), id.node())
}

/// 参数编码（请求数据前两字节）
pub fn code_of(frame: &CgFrame) -> u16 {
    u16::from_le_bytes([frame.data[0], frame.data[1]])
}

/// ReadConfig 应答的一帧
pub fn config_chunk(node: u8, code: u16, tag: u8, seq: u8, payload: &[u8]) -> CgFrame {
    let mut data = vec![code as u8, (code >> 8) as u8, tag, seq];
    data.extend_from_slice(payload);
    reply(9, 0, node, &data)
}

/// 一帧静止状态的反馈（位置/速度/力矩为 0，温度 25.0 ℃）
pub fn feedback_frame(node: u8) -> CgFrame {
    let mut data = [0u8; 8];
    data[0..2].copy_from_slice(&0x8000u16.to_be_bytes());
    data[2..4].copy_from_slice(&0x8000u16.to_be_bytes());
    data[4..6].copy_from_slice(&0x8000u16.to_be_bytes());
    data[6..8].copy_from_slice(&250u16.to_be_bytes());
    reply(2, 0x80, node, &data)
}

pub fn uid_frame(node: u8, uid: u64) -> CgFrame {
    reply(0, 0, node, &uid.to_le_bytes())
}

pub fn alarm_frame(node: u8, fault_word: u64) -> CgFrame {
    reply(21, 0, node, &fault_word.to_le_bytes())
}

/// 对 `nodes` 中的节点应答 GetUid 和所有反馈类请求
pub fn install_motors(mock: &MockCanAdapter, nodes: &'static [u8]) {
    mock.set_responder(move |frame| {
        let (command, node) = request_of(frame);
        if !nodes.contains(&node) {
            return Vec::new();
        }
        match command {
            0 | 22 => vec![uid_frame(node, 0x1122_3344_5566_0000 | node as u64)],
            1..=4 | 6 | 18 => vec![feedback_frame(node)],
            _ => Vec::new(),
        }
    });
}
