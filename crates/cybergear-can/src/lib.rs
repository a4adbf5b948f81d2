//! # CyberGear CAN Adapter Layer
//!
//! CAN 硬件抽象层。事务层只通过 [`CanAdapter`] 访问总线，
//! 具体后端（SocketCAN、Mock）在这里实现。

use std::time::Duration;
use thiserror::Error;

// 重新导出 cybergear-protocol 中的 CgFrame
pub use cybergear_protocol::CgFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockCanAdapter;

/// 默认发送超时
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::AccessDenied | CanDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// CAN 传输抽象
///
/// 事务层只依赖 `send_timeout` 和 `receive_timeout`；
/// `CanError::Timeout` 表示在超时内没有收到帧，不是故障。
pub trait CanAdapter {
    fn send(&mut self, frame: CgFrame) -> Result<(), CanError>;
    fn receive(&mut self) -> Result<CgFrame, CanError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<CgFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<CgFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
    fn send_timeout(&mut self, frame: CgFrame, _timeout: Duration) -> Result<(), CanError> {
        self.send(frame)
    }
}

impl<A: CanAdapter + ?Sized> CanAdapter for Box<A> {
    fn send(&mut self, frame: CgFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }
    fn receive(&mut self) -> Result<CgFrame, CanError> {
        (**self).receive()
    }
    fn set_receive_timeout(&mut self, timeout: Duration) {
        (**self).set_receive_timeout(timeout)
    }
    fn receive_timeout(&mut self, timeout: Duration) -> Result<CgFrame, CanError> {
        (**self).receive_timeout(timeout)
    }
    fn try_receive(&mut self) -> Result<Option<CgFrame>, CanError> {
        (**self).try_receive()
    }
    fn send_timeout(&mut self, frame: CgFrame, timeout: Duration) -> Result<(), CanError> {
        (**self).send_timeout(frame, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_fatal() {
        assert!(CanDeviceError::new(CanDeviceErrorKind::NotFound, "can9").is_fatal());
        assert!(!CanDeviceError::from("transient").is_fatal());
    }

    #[test]
    fn test_boxed_adapter_forwards() {
        let mock = MockCanAdapter::new();
        let mut boxed: Box<dyn CanAdapter + Send> = Box::new(mock.clone());
        boxed.send(CgFrame::new_extended(0x0300_FD01, &[0; 8])).unwrap();
        assert_eq!(mock.sent_frames().len(), 1);
        assert!(matches!(boxed.try_receive(), Ok(None)));
    }
}
