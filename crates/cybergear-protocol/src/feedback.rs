//! 应答帧解析
//!
//! 所有应答帧的 ID 都采用应答布局（见 [`crate::ids`]）。解析器只检查通信类型
//! 和长度，节点与请求的匹配由事务层完成。

use crate::{
    CgFrame, ProtocolError,
    ids::{ArbitrationId, Command, MotorStatus},
    param::{ParamValue, WireType},
    units::{POSITION, TEMPERATURE, TORQUE, VELOCITY},
};

/// 检查通信类型并返回解析后的 ID
fn expect_command(frame: &CgFrame, expected: Command) -> Result<ArbitrationId, ProtocolError> {
    let id = frame.arbitration_id();
    let actual = id.command().value();
    if actual != expected.code() {
        return Err(ProtocolError::UnexpectedCommand { expected, actual });
    }
    Ok(id)
}

fn expect_len(frame: &CgFrame, expected: usize) -> Result<(), ProtocolError> {
    if (frame.len as usize) < expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: frame.len as usize,
        });
    }
    Ok(())
}

fn be_u16(data: &[u8; 8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

// ============================================================================
// 电机反馈（通信类型 2）
// ============================================================================

/// 电机反馈
///
/// Enable / Disable / SetZero / 运控指令 / WriteParam 的应答都是这一帧。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedback {
    /// 应答电机 ID
    pub node: u8,
    /// 状态字节解析结果
    pub status: MotorStatus,
    /// 原始状态字节
    pub fault_flags: u8,
    /// 当前角度 (rad)
    pub position: f32,
    /// 当前角速度 (rad/s)
    pub velocity: f32,
    /// 当前力矩 (N·m)
    pub torque: f32,
    /// 当前温度 (℃)
    pub temperature: f32,
}

impl TryFrom<CgFrame> for Feedback {
    type Error = ProtocolError;

    fn try_from(frame: CgFrame) -> Result<Self, Self::Error> {
        let id = expect_command(&frame, Command::Feedback)?;
        expect_len(&frame, 8)?;

        Ok(Self {
            node: id.source_node(),
            status: id.status(),
            fault_flags: id.status_byte(),
            position: POSITION.to_engineering(be_u16(&frame.data, 0)),
            velocity: VELOCITY.to_engineering(be_u16(&frame.data, 2)),
            torque: TORQUE.to_engineering(be_u16(&frame.data, 4)),
            temperature: TEMPERATURE.to_engineering(be_u16(&frame.data, 6)),
        })
    }
}

// ============================================================================
// 设备 ID（通信类型 0 的应答，也是 ChangeId / SetBaud 的应答）
// ============================================================================

/// 64 位 MCU 唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceUid {
    /// 应答电机 ID
    pub node: u8,
    pub uid: u64,
}

impl TryFrom<CgFrame> for DeviceUid {
    type Error = ProtocolError;

    fn try_from(frame: CgFrame) -> Result<Self, Self::Error> {
        expect_len(&frame, 8)?;
        Ok(Self {
            node: frame.arbitration_id().source_node(),
            uid: u64::from_le_bytes(frame.data),
        })
    }
}

// ============================================================================
// 参数读取应答（通信类型 17）
// ============================================================================

/// 参数区读取应答
///
/// ```text
/// Byte 0-1: 参数编码（小端）
/// Byte 2-3: 保留
/// Byte 4-7: 数值（小端，宽度由线上类型决定）
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamReadReply {
    pub node: u8,
    pub code: u16,
    pub raw: [u8; 4],
}

impl TryFrom<CgFrame> for ParamReadReply {
    type Error = ProtocolError;

    fn try_from(frame: CgFrame) -> Result<Self, Self::Error> {
        let id = expect_command(&frame, Command::ReadParam)?;
        expect_len(&frame, 8)?;
        let d = frame.data;
        Ok(Self {
            node: id.source_node(),
            code: u16::from_le_bytes([d[0], d[1]]),
            raw: [d[4], d[5], d[6], d[7]],
        })
    }
}

impl ParamReadReply {
    /// 按调用方给出的线上类型解码
    pub fn value(&self, wire_type: WireType) -> Result<ParamValue, ProtocolError> {
        ParamValue::decode_le(wire_type, self.raw)
    }
}

// ============================================================================
// 配置区读取应答（通信类型 9）
// ============================================================================

/// 配置区读取应答的一帧
///
/// ```text
/// Byte 0-1: 参数编码（小端）
/// Byte 2:   类型标签
/// Byte 3:   帧序号
/// Byte 4-7: 数据片段
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigChunk {
    pub node: u8,
    pub code: u16,
    pub tag: u8,
    pub sequence: u8,
    payload: [u8; 4],
    payload_len: u8,
}

impl TryFrom<CgFrame> for ConfigChunk {
    type Error = ProtocolError;

    fn try_from(frame: CgFrame) -> Result<Self, Self::Error> {
        let id = expect_command(&frame, Command::ReadConfig)?;
        expect_len(&frame, 4)?;
        let d = frame.data;
        let payload_len = frame.len.saturating_sub(4);
        Ok(Self {
            node: id.source_node(),
            code: u16::from_le_bytes([d[0], d[1]]),
            tag: d[2],
            sequence: d[3],
            payload: [d[4], d[5], d[6], d[7]],
            payload_len,
        })
    }
}

impl ConfigChunk {
    /// 数据片段（Byte 4..len）
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len as usize]
    }

    /// 零填充到 4 字节的数据片段
    pub fn padded_payload(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out[..self.payload_len as usize].copy_from_slice(self.payload());
        out
    }

    pub fn wire_type(&self) -> Result<WireType, ProtocolError> {
        WireType::from_tag(self.tag)
    }
}

// ============================================================================
// 原始配置区读取应答（通信类型 19）
// ============================================================================

/// 原始配置区的一帧
///
/// 状态字节低 4 位为 0x9 时是结束帧，其余帧的 Byte 2..len 依次拼接。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawConfigChunk {
    pub node: u8,
    pub is_terminal: bool,
    payload: [u8; 6],
    payload_len: u8,
}

/// 结束帧在状态字节低 4 位中的标记
const RAW_CONFIG_TERMINAL: u8 = 0x9;

impl TryFrom<CgFrame> for RawConfigChunk {
    type Error = ProtocolError;

    fn try_from(frame: CgFrame) -> Result<Self, Self::Error> {
        let id = expect_command(&frame, Command::ReadRawConfig)?;
        let mut payload = [0u8; 6];
        payload.copy_from_slice(&frame.data[2..8]);
        Ok(Self {
            node: id.source_node(),
            is_terminal: id.status_byte() & 0x0F == RAW_CONFIG_TERMINAL,
            payload,
            payload_len: frame.len.saturating_sub(2),
        })
    }
}

impl RawConfigChunk {
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len as usize]
    }
}

// ============================================================================
// 故障告警（通信类型 21）
// ============================================================================

/// 电机主动上报的故障告警
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmFrame {
    pub node: u8,
    pub fault_word: u64,
}

impl TryFrom<CgFrame> for AlarmFrame {
    type Error = ProtocolError;

    fn try_from(frame: CgFrame) -> Result<Self, Self::Error> {
        let id = expect_command(&frame, Command::Alarm)?;
        // 短帧的缺失字节按 0 处理
        Ok(Self {
            node: id.source_node(),
            fault_word: u64::from_le_bytes(frame.data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MotorMode;

    fn reply(command: u8, status: u8, node: u8, data: &[u8]) -> CgFrame {
        let id = ArbitrationId::from_parts(command, ((status as u16) << 8) | node as u16, 0xFD);
        CgFrame::new_extended(id.raw(), data)
    }

    #[test]
    fn test_feedback_decode() {
        let frame = reply(2, 0x80, 1, &[0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00, 0xFA]);
        let fb = Feedback::try_from(frame).unwrap();
        assert_eq!(fb.node, 1);
        assert_eq!(fb.fault_flags, 0x80);
        assert_eq!(fb.status.motor_mode(), MotorMode::Run);
        assert!(!fb.status.has_fault());
        assert!(fb.position.abs() < 1e-3);
        assert!(fb.velocity.abs() < 1e-3);
        assert!(fb.torque.abs() < 1e-3);
        assert!((fb.temperature - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_feedback_boundaries() {
        let frame = reply(2, 0, 1, &[0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0, 0]);
        let fb = Feedback::try_from(frame).unwrap();
        assert!((fb.position - 4.0 * std::f32::consts::PI).abs() < 1e-4);
        assert!((fb.velocity + 30.0).abs() < 1e-4);
        assert!((fb.torque - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_feedback_wrong_command() {
        let frame = reply(17, 0, 1, &[0; 8]);
        assert_eq!(
            Feedback::try_from(frame),
            Err(ProtocolError::UnexpectedCommand {
                expected: Command::Feedback,
                actual: 17
            })
        );
    }

    #[test]
    fn test_feedback_short_frame() {
        let frame = reply(2, 0, 1, &[0; 6]);
        assert_eq!(
            Feedback::try_from(frame),
            Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn test_device_uid() {
        let frame = reply(0, 0, 9, &0x0123_4567_89AB_CDEFu64.to_le_bytes());
        let uid = DeviceUid::try_from(frame).unwrap();
        assert_eq!(uid.node, 9);
        assert_eq!(uid.uid, 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_param_read_reply() {
        let frame = reply(17, 0, 1, &[0x05, 0x70, 0, 0, 2, 0xAA, 0xAA, 0xAA]);
        let r = ParamReadReply::try_from(frame).unwrap();
        assert_eq!(r.code, 0x7005);
        assert_eq!(r.value(WireType::U8).unwrap(), ParamValue::U8(2));

        let mut data = [0x17, 0x70, 0, 0, 0, 0, 0, 0];
        data[4..8].copy_from_slice(&1.5f32.to_le_bytes());
        let r = ParamReadReply::try_from(reply(17, 0, 1, &data)).unwrap();
        assert_eq!(r.value(WireType::F32).unwrap(), ParamValue::F32(1.5));
    }

    #[test]
    fn test_config_chunk() {
        let frame = reply(9, 0, 1, &[0x00, 0x00, 0x0A, 0x00, b'A', b'B']);
        let chunk = ConfigChunk::try_from(frame).unwrap();
        assert_eq!(chunk.code, 0x0000);
        assert_eq!(chunk.wire_type().unwrap(), WireType::Str);
        assert_eq!(chunk.payload(), b"AB");
        assert_eq!(chunk.padded_payload(), [b'A', b'B', 0, 0]);
    }

    #[test]
    fn test_config_chunk_unknown_tag() {
        let frame = reply(9, 0, 1, &[0x00, 0x20, 0x07, 0x00, 0, 0, 0, 0]);
        let chunk = ConfigChunk::try_from(frame).unwrap();
        assert_eq!(chunk.wire_type(), Err(ProtocolError::UnknownWireType(0x07)));
    }

    #[test]
    fn test_raw_config_chunk() {
        let frame = reply(19, 0x00, 1, &[0, 0, 1, 2, 3, 4, 5, 6]);
        let chunk = RawConfigChunk::try_from(frame).unwrap();
        assert!(!chunk.is_terminal);
        assert_eq!(chunk.payload(), &[1, 2, 3, 4, 5, 6]);

        let frame = reply(19, 0x09, 1, &[0; 8]);
        assert!(RawConfigChunk::try_from(frame).unwrap().is_terminal);

        // 高 4 位不参与判断
        let frame = reply(19, 0x89, 1, &[0; 8]);
        assert!(RawConfigChunk::try_from(frame).unwrap().is_terminal);
    }

    #[test]
    fn test_alarm_frame() {
        let frame = reply(21, 0, 4, &0x10u64.to_le_bytes());
        let alarm = AlarmFrame::try_from(frame).unwrap();
        assert_eq!(alarm.node, 4);
        assert_eq!(alarm.fault_word, 0x10);
    }
}
