//! CAN ID 布局与指令类型定义
//!
//! CyberGear 把所有寻址信息都放在 29 位扩展 ID 中（高位在前）：
//!
//! ```text
//! bit 28..24   bit 23..8          bit 7..0
//! ┌─────────┬──────────────────┬──────────┐
//! │ command │      option      │   node   │
//! └─────────┴──────────────────┴──────────┘
//! ```
//!
//! 请求帧中 `option` 的含义随指令变化（主机 ID、前馈力矩、新 ID 打包等）；
//! 应答帧中 `option` 的低 8 位是应答电机的 ID，高 8 位是状态字节，
//! `node` 字段则是应答所发往的主机 ID。

use crate::ProtocolError;
use bilge::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 29 位扩展帧 ID 掩码
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// 物理节点 ID 上限（7 位）
pub const MAX_NODE_ID: u8 = 0x7F;

/// 默认主机 ID（请求帧中 option 低 8 位）
pub const DEFAULT_HOST_ID: u8 = 0xFD;

/// 检查节点 ID 是否落在物理节点范围内
pub fn validate_node(node: u8) -> Result<u8, ProtocolError> {
    if node > MAX_NODE_ID {
        return Err(ProtocolError::InvalidNodeId { node });
    }
    Ok(node)
}

// ============================================================================
// 指令类型
// ============================================================================

/// 通信类型（ID bit 28..24）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Command {
    /// 获取设备 ID（64 位 MCU 唯一标识）
    GetUid = 0,
    /// 运控模式指令
    ControlMode = 1,
    /// 电机反馈
    Feedback = 2,
    /// 电机使能运行
    Enable = 3,
    /// 电机停止运行
    Disable = 4,
    /// 设置机械零位
    SetZero = 6,
    /// 设置电机 CAN ID
    ChangeId = 7,
    /// 读取配置区参数（可能多帧）
    ReadConfig = 9,
    /// 单个参数读取
    ReadParam = 17,
    /// 单个参数写入
    WriteParam = 18,
    /// 读取原始配置区（诊断用，流式多帧）
    ReadRawConfig = 19,
    /// 故障告警（电机主动上报，仅接收）
    Alarm = 21,
    /// 修改波特率
    SetBaud = 22,
}

impl Command {
    /// 从 5 位字段解析指令类型
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        Command::try_from(code).map_err(|_| ProtocolError::UnknownCommand(code))
    }

    /// 指令码
    pub fn code(self) -> u8 {
        self.into()
    }
}

// ============================================================================
// ID 位域
// ============================================================================

/// 29 位扩展帧 ID
///
/// bilge 默认使用 LSB first 位序：第一个字段占据最低位。
#[bitsize(29)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct ArbitrationId {
    pub node: u8,    // Bit 0-7: 目标节点（请求）/ 主机 ID（应答）
    pub option: u16, // Bit 8-23: 指令相关字段
    pub command: u5, // Bit 24-28: 通信类型
}

impl ArbitrationId {
    /// 从原始 ID 解析（高 3 位被忽略）
    pub fn from_raw(raw: u32) -> Self {
        Self::from(u29::new(raw & EXTENDED_ID_MASK))
    }

    /// 由三元组构建（不做节点范围检查）
    pub fn from_parts(command: u8, option: u16, node: u8) -> Self {
        Self::new(node, option, u5::new(command & 0x1F))
    }

    /// 构建发往物理节点的请求 ID
    ///
    /// 节点 ID 超过 0x7F 时不产生任何 ID（前置条件错误，而非协议错误）。
    pub fn request(command: Command, option: u16, node: u8) -> Result<Self, ProtocolError> {
        validate_node(node)?;
        Ok(Self::from_parts(command.code(), option, node))
    }

    /// 转换为原始 29 位 ID
    pub fn raw(self) -> u32 {
        u29::from(self).value()
    }

    /// 解析通信类型
    pub fn command_kind(self) -> Result<Command, ProtocolError> {
        Command::from_code(self.command().value())
    }

    /// 应答帧：发出应答的电机 ID（option 低 8 位）
    pub fn source_node(self) -> u8 {
        (self.option() & 0xFF) as u8
    }

    /// 应答帧：状态字节（option 高 8 位，即 ID bit 16..23）
    pub fn status_byte(self) -> u8 {
        (self.option() >> 8) as u8
    }

    /// 应答帧：解析状态字节
    pub fn status(self) -> MotorStatus {
        MotorStatus::from(u8::new(self.status_byte()))
    }

    /// 应答帧：应答发往的主机 ID
    pub fn host(self) -> u8 {
        self.node()
    }
}

// ============================================================================
// 应答状态位域
// ============================================================================

/// 应答帧状态字节（ID bit 16..23）
///
/// 协议定义：
/// - Bit 0: 欠压故障
/// - Bit 1: 过流
/// - Bit 2: 过温
/// - Bit 3: 磁编码故障
/// - Bit 4: HALL 编码故障
/// - Bit 5: 未标定
/// - Bit 6-7: 模式状态（0: Reset, 1: Cali, 2: Motor）
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct MotorStatus {
    pub under_voltage: bool,
    pub over_current: bool,
    pub over_temperature: bool,
    pub magnetic_encoder_fault: bool,
    pub hall_encoder_fault: bool,
    pub uncalibrated: bool,
    pub mode: u2,
}

/// 电机模式状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMode {
    /// Reset 模式（复位）
    Reset,
    /// Cali 模式（标定）
    Calibration,
    /// Motor 模式（运行）
    Run,
    /// 保留值
    Unknown,
}

impl MotorStatus {
    /// 是否存在任一故障位
    pub fn has_fault(&self) -> bool {
        u8::from(*self).value() & 0x3F != 0
    }

    /// 模式状态
    pub fn motor_mode(&self) -> MotorMode {
        match self.mode().value() {
            0 => MotorMode::Reset,
            1 => MotorMode::Calibration,
            2 => MotorMode::Run,
            _ => MotorMode::Unknown,
        }
    }
}
