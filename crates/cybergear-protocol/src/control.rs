//! 请求帧构建
//!
//! 每个请求都是一个 8 字节、零填充的扩展帧。`option` 字段的含义随通信类型变化：
//! 普通请求为主机 ID，运控指令为前馈力矩（总线值），修改 ID 为 `(new_node << 8) | host`。

use crate::{
    CgFrame, ProtocolError,
    ids::{ArbitrationId, Command, validate_node},
    units::{KD, KP, POSITION, TORQUE, VELOCITY},
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// ReadRawConfig 请求的固定数据
pub const RAW_CONFIG_MAGIC: [u8; 8] = [0xC4, 0x7F, 0x31, 0x31, 0x30, 0x33, 0x31, 0x04];

// ============================================================================
// 运控指令
// ============================================================================

/// 运控模式设定值（物理量）
///
/// 超出区间的分量在编码时饱和到边界。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionCommand {
    /// 前馈力矩 (N·m)，-12 ~ 12
    pub torque: f32,
    /// 目标角度 (rad)，-4π ~ 4π
    pub position: f32,
    /// 目标角速度 (rad/s)，-30 ~ 30
    pub velocity: f32,
    /// 位置增益，0 ~ 500
    pub kp: f32,
    /// 速度增益，0 ~ 5
    pub kd: f32,
}

impl MotionCommand {
    pub fn new(torque: f32, position: f32, velocity: f32, kp: f32, kd: f32) -> Self {
        Self {
            torque,
            position,
            velocity,
            kp,
            kd,
        }
    }

    /// 转换为总线值
    pub fn to_raw(&self) -> RawMotionCommand {
        RawMotionCommand {
            torque: TORQUE.to_bus(self.torque),
            position: POSITION.to_bus(self.position),
            velocity: VELOCITY.to_bus(self.velocity),
            kp: KP.to_bus(self.kp),
            kd: KD.to_bus(self.kd),
        }
    }
}

/// 运控模式设定值（总线值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawMotionCommand {
    pub torque: u16,   // ID option 字段
    pub position: u16, // Byte 0-1
    pub velocity: u16, // Byte 2-3
    pub kp: u16,       // Byte 4-5
    pub kd: u16,       // Byte 6-7
}

impl From<MotionCommand> for RawMotionCommand {
    fn from(cmd: MotionCommand) -> Self {
        cmd.to_raw()
    }
}

// ============================================================================
// 运行模式 / 波特率
// ============================================================================

/// 运行模式（参数 `run_mode`，0x7005）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RunMode {
    /// 运控模式（MIT）
    Operation = 0,
    /// 位置模式
    Position = 1,
    /// 速度模式
    Speed = 2,
    /// 电流模式
    Current = 3,
}

impl RunMode {
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        RunMode::try_from(code).map_err(|_| ProtocolError::InvalidValue {
            field: "RunMode".to_string(),
            value: code,
        })
    }

    pub fn code(self) -> u8 {
        self.into()
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::Operation => "operation",
            RunMode::Position => "position",
            RunMode::Speed => "speed",
            RunMode::Current => "current",
        };
        f.write_str(name)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "operation" | "mit" => Ok(RunMode::Operation),
            "1" | "position" => Ok(RunMode::Position),
            "2" | "speed" => Ok(RunMode::Speed),
            "3" | "current" => Ok(RunMode::Current),
            _ => Err(format!(
                "invalid run mode '{}', expected operation|position|speed|current or 0-3",
                s
            )),
        }
    }
}

/// CAN 波特率选择值（通信类型 22）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Baud {
    Mbps1 = 1,
    Kbps500 = 2,
    Kbps250 = 3,
    Kbps125 = 4,
}

impl Baud {
    /// 解析选择值，1..=4 以外的值被拒绝
    pub fn from_selector(selector: u8) -> Result<Self, ProtocolError> {
        Baud::try_from(selector).map_err(|_| ProtocolError::InvalidValue {
            field: "Baud".to_string(),
            value: selector,
        })
    }

    pub fn selector(self) -> u8 {
        self.into()
    }

    /// 比特率 (bit/s)
    pub fn bitrate(self) -> u32 {
        match self {
            Baud::Mbps1 => 1_000_000,
            Baud::Kbps500 => 500_000,
            Baud::Kbps250 => 250_000,
            Baud::Kbps125 => 125_000,
        }
    }
}

impl FromStr for Baud {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "1m" | "1000k" | "1000000" => Ok(Baud::Mbps1),
            "2" | "500k" | "500000" => Ok(Baud::Kbps500),
            "3" | "250k" | "250000" => Ok(Baud::Kbps250),
            "4" | "125k" | "125000" => Ok(Baud::Kbps125),
            _ => Err(format!(
                "invalid baud '{}', expected 1m|500k|250k|125k or selector 1-4",
                s
            )),
        }
    }
}

// ============================================================================
// 请求
// ============================================================================

/// 发往电机的请求
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// 获取 64 位设备 ID
    GetUid,
    /// 运控指令
    Control(RawMotionCommand),
    /// 请求一帧反馈
    Feedback,
    /// 使能
    Enable,
    /// 停止（`clear_fault` 为 true 时同时清除故障）
    Disable { clear_fault: bool },
    /// 设置机械零位
    SetZero,
    /// 修改节点 ID
    ChangeId { new_node: u8 },
    /// 读取配置区参数
    ReadConfig { code: u16 },
    /// 读取参数区参数
    ReadParam { code: u16 },
    /// 写入参数（数值为小端 4 字节，已按线上类型编码）
    WriteParam { code: u16, value: [u8; 4] },
    /// 读取原始配置区
    ReadRawConfig,
    /// 修改波特率
    SetBaud(Baud),
}

impl Request {
    /// 通信类型
    pub fn command(&self) -> Command {
        match self {
            Request::GetUid => Command::GetUid,
            Request::Control(_) => Command::ControlMode,
            Request::Feedback => Command::Feedback,
            Request::Enable => Command::Enable,
            Request::Disable { .. } => Command::Disable,
            Request::SetZero => Command::SetZero,
            Request::ChangeId { .. } => Command::ChangeId,
            Request::ReadConfig { .. } => Command::ReadConfig,
            Request::ReadParam { .. } => Command::ReadParam,
            Request::WriteParam { .. } => Command::WriteParam,
            Request::ReadRawConfig => Command::ReadRawConfig,
            Request::SetBaud(_) => Command::SetBaud,
        }
    }

    /// ID option 字段
    pub fn option(&self, host: u8) -> u16 {
        match self {
            Request::Control(raw) => raw.torque,
            Request::ChangeId { new_node } => ((*new_node as u16) << 8) | host as u16,
            _ => host as u16,
        }
    }

    /// 8 字节数据（零填充）
    pub fn payload(&self) -> [u8; 8] {
        let mut data = [0u8; 8];
        match self {
            Request::Control(raw) => {
                data[0..2].copy_from_slice(&raw.position.to_be_bytes());
                data[2..4].copy_from_slice(&raw.velocity.to_be_bytes());
                data[4..6].copy_from_slice(&raw.kp.to_be_bytes());
                data[6..8].copy_from_slice(&raw.kd.to_be_bytes());
            },
            Request::Disable { clear_fault } => data[0] = u8::from(*clear_fault),
            Request::SetZero => data[0] = 1,
            Request::ReadConfig { code } | Request::ReadParam { code } => {
                data[0..2].copy_from_slice(&code.to_le_bytes());
            },
            Request::WriteParam { code, value } => {
                data[0..2].copy_from_slice(&code.to_le_bytes());
                // Byte 2-3: 保留
                data[4..8].copy_from_slice(value);
            },
            Request::ReadRawConfig => data = RAW_CONFIG_MAGIC,
            Request::SetBaud(baud) => data[0] = baud.selector(),
            Request::GetUid | Request::Feedback | Request::Enable | Request::ChangeId { .. } => {},
        }
        data
    }

    /// 构建发往 `node` 的请求帧
    ///
    /// `node` 或 ChangeId 的新 ID 超过 0x7F 时返回错误，不产生帧。
    pub fn to_frame(&self, node: u8, host: u8) -> Result<CgFrame, ProtocolError> {
        if let Request::ChangeId { new_node } = self {
            validate_node(*new_node)?;
        }
        let id = ArbitrationId::request(self.command(), self.option(host), node)?;
        Ok(CgFrame::new_extended(id.raw(), &self.payload()))
    }
}
