//! 驱动层错误类型定义

use cybergear_can::CanError;
use cybergear_protocol::{Command, ProtocolError};
use thiserror::Error;

/// 驱动层错误类型
///
/// 所有错误都不是致命的：总线锁在返回前已释放，调用方可以立即发起下一次事务。
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 节点 ID 超出 0..=0x7F（未发送任何帧）
    #[error("Invalid node id {node} (expected 0..=0x7F)")]
    InvalidNodeId { node: u8 },

    /// 波特率选择值超出 1..=4（未发送任何帧）
    #[error("Invalid baud selector {0} (expected 1..=4)")]
    InvalidBaud(u8),

    /// 等待应答超时
    #[error("Timeout waiting for {command:?} reply from node {node}")]
    Timeout { node: u8, command: Command },

    /// 多帧重组失败
    #[error("Reassembly of parameter 0x{code:04X} failed: {reason}")]
    Reassembly { code: u16, reason: String },

    /// 按节点匹配到的应答通信类型不符
    #[error("Unexpected reply from node {node}: expected {expected:?}, got command {actual}")]
    UnexpectedReply {
        node: u8,
        expected: Command,
        actual: u8,
    },

    /// 参数表中没有该参数
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// 事务被取消
    #[error("Transaction cancelled")]
    Cancelled,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DriverError {
    /// 是否为超时（节点不存在或未应答）
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::Can(CanError::Timeout);
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Read timeout"), "Can error message: {}", msg);

        let driver_error = DriverError::Protocol(ProtocolError::InvalidLength {
            expected: 8,
            actual: 4,
        });
        assert!(format!("{}", driver_error).contains("Invalid frame length"));

        let driver_error = DriverError::Timeout {
            node: 3,
            command: Command::GetUid,
        };
        assert_eq!(
            driver_error.to_string(),
            "Timeout waiting for GetUid reply from node 3"
        );

        let driver_error = DriverError::Reassembly {
            code: 0x1003,
            reason: "tag changed".into(),
        };
        assert!(driver_error.to_string().contains("0x1003"));
    }

    #[test]
    fn test_from_conversions() {
        let e: DriverError = CanError::BusOff.into();
        assert!(matches!(e, DriverError::Can(CanError::BusOff)));

        let e: DriverError = ProtocolError::UnknownCommand(5).into();
        assert!(matches!(e, DriverError::Protocol(ProtocolError::UnknownCommand(5))));
    }

    #[test]
    fn test_is_timeout() {
        assert!(
            DriverError::Timeout {
                node: 1,
                command: Command::Enable
            }
            .is_timeout()
        );
        assert!(!DriverError::Cancelled.is_timeout());
    }
}
