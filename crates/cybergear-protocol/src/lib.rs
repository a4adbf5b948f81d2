//! # CyberGear Protocol
//!
//! CyberGear 电机私有 CAN 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 29 位扩展帧 ID 布局与指令类型
//! - `control`: 请求帧构建
//! - `feedback`: 应答帧解析
//! - `param`: 参数表与线上数据类型
//! - `units`: 总线定点值与物理量的换算
//!
//! ## 字节序
//!
//! 运控/反馈帧中的 16 位字段使用大端字节序，参数读写帧中的编码和数值使用小端字节序。

pub mod control;
pub mod feedback;
pub mod ids;
pub mod param;
pub mod units;

// 重新导出常用类型
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use param::*;
pub use units::*;

/// CAN 2.0 扩展帧的统一抽象
///
/// `CgFrame` 是协议层和硬件层之间的中间抽象：协议层只负责构建和解析
/// `CgFrame`，具体的 CAN 后端（SocketCAN、Mock）在 CAN 层完成转换。
///
/// ```text
/// Protocol Layer (cybergear-protocol)
///     ↓ Request::to_frame() 构建 / TryFrom<CgFrame> 解析
/// CgFrame (此类型)
///     ↓ 转换逻辑在 CAN 层实现
/// CAN Layer (cybergear-can)
/// ```
///
/// # 转换示例
///
/// ```rust
/// use cybergear_protocol::CgFrame;
///
/// let frame = CgFrame::new_extended(0x0300_FD01, &[0; 8]);
/// assert_eq!(frame.id(), 0x0300_FD01);
/// assert_eq!(frame.data_slice().len(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CgFrame {
    /// CAN ID（CyberGear 协议只使用 29 位扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl CgFrame {
    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id & EXTENDED_ID_MASK, data, true)
    }

    /// 创建标准帧（仅用于过滤测试，协议本身不使用标准帧）
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }

    /// 解析 29 位 ID 布局
    pub fn arbitration_id(&self) -> ArbitrationId {
        ArbitrationId::from_raw(self.id)
    }
}

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    #[error("Node id {node} out of range (0..=0x7F)")]
    InvalidNodeId { node: u8 },

    #[error("Unknown command code: {0}")]
    UnknownCommand(u8),

    #[error("Unexpected command: expected {expected:?}, got {actual}")]
    UnexpectedCommand { expected: Command, actual: u8 },

    #[error("Unknown wire type tag: 0x{0:02X}")]
    UnknownWireType(u8),

    #[error("Value {value} cannot be encoded as {wire_type:?}")]
    ValueOutOfRange { wire_type: WireType, value: f64 },

    #[error("Wire type {0:?} cannot be written")]
    NotWritable(WireType),

    #[error("Wire type {0:?} is not a fixed-width value")]
    NotFixedWidth(WireType),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}
