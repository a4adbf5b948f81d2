//! SocketCAN CAN 适配器实现
//!
//! Linux 平台下基于内核 SocketCAN 子系统的适配器。
//!
//! ## 特性
//!
//! - 禁用回环（本机发送的帧不会出现在接收端）
//! - 自动过滤错误帧（Bus Off 除外，作为错误上报）
//! - 只向上层传递扩展帧，标准帧与远程帧被丢弃
//!
//! ## 限制
//!
//! - **接口配置**：波特率等配置由系统工具（`ip link`）完成，不在应用层设置
//! - **权限要求**：可能需要 `dialout` 组权限或 `sudo`

use crate::{CanAdapter, CanError, CgFrame};
use socketcan::{
    BlockingCan, CanError as SocketCanError, CanFrame, CanSocket, EmbeddedFrame, ExtendedId,
    Frame, Socket,
};
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, trace, warn};

/// 内核不接受零读超时（零表示永久阻塞），下限取 100µs
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(100);

/// 默认读超时
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use cybergear_can::{CanAdapter, CgFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(CgFrame::new_extended(0x0300_FD01, &[0; 8])).unwrap();
/// let rx_frame = adapter.receive().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    /// 当前读超时
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 打开 CAN 接口
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在或无法打开
    /// - `CanError::Io`: 系统调用失败
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(format!("Failed to open CAN interface '{}': {}", interface, e).into())
        })?;

        // 禁用 Loopback：TX 帧不回环到 RX，否则会被事务层当作杂散帧
        let loopback_enabled: libc::c_int = 0;
        let loopback_result = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_CAN_RAW,
                libc::CAN_RAW_LOOPBACK,
                &loopback_enabled as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };

        if loopback_result < 0 {
            warn!(
                "Failed to disable CAN_RAW_LOOPBACK on '{}': {}",
                interface,
                std::io::Error::last_os_error()
            );
        } else {
            trace!(
                "SocketCAN interface '{}' loopback disabled (CAN_RAW_LOOPBACK=0)",
                interface
            );
        }

        socket.set_read_timeout(DEFAULT_READ_TIMEOUT).map_err(CanError::Io)?;
        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取当前读超时
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// 设置读超时
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        if timeout != self.read_timeout {
            self.socket.set_read_timeout(timeout).map_err(CanError::Io)?;
            self.read_timeout = timeout;
        }
        Ok(())
    }

    /// 读一帧原始帧，超时映射为 `CanError::Timeout`
    fn read_raw(&self) -> Result<CanFrame, CanError> {
        self.socket.read_frame().map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => CanError::Timeout,
            _ => CanError::Io(e),
        })
    }

    fn to_cg_frame<F: EmbeddedFrame + Frame>(frame: &F) -> CgFrame {
        let mut out = CgFrame::new_extended(frame.raw_id(), frame.data());
        out.timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        out
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        trace!("SocketCAN interface '{}' closed", self.interface);
    }
}

impl CanAdapter for SocketCanAdapter {
    /// 发送帧（Fire-and-Forget）
    fn send(&mut self, frame: CgFrame) -> Result<(), CanError> {
        if !frame.is_extended {
            return Err(CanError::Device(
                format!("Standard frame 0x{:X} is not supported", frame.id).into(),
            ));
        }

        let can_frame = ExtendedId::new(frame.id)
            .and_then(|id| CanFrame::new(id, frame.data_slice()))
            .ok_or_else(|| {
                CanError::Device(
                    format!("Failed to create extended frame with ID 0x{:X}", frame.id).into(),
                )
            })?;

        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:08X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 接收帧（阻塞直到收到扩展数据帧或读超时）
    fn receive(&mut self) -> Result<CgFrame, CanError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            match self.read_raw()? {
                CanFrame::Data(data) if data.is_extended() => {
                    let frame = Self::to_cg_frame(&data);
                    trace!(
                        "Received CAN frame: ID=0x{:08X}, len={}, timestamp_us={}",
                        frame.id, frame.len, frame.timestamp_us
                    );
                    return Ok(frame);
                },
                CanFrame::Data(data) => {
                    trace!("Ignoring standard frame: ID=0x{:X}", data.raw_id());
                },
                CanFrame::Remote(remote) => {
                    trace!("Ignoring remote frame: ID=0x{:X}", remote.raw_id());
                },
                CanFrame::Error(err_frame) => match SocketCanError::from(err_frame) {
                    SocketCanError::BusOff => {
                        error!("CAN Bus Off error detected");
                        return Err(CanError::BusOff);
                    },
                    other => warn!("CAN Error Frame received: {}, ignoring", other),
                },
            }
            // 被过滤的帧不延长总等待时间
            if Instant::now() >= deadline {
                return Err(CanError::Timeout);
            }
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<CgFrame, CanError> {
        self.set_read_timeout(timeout)?;
        self.receive()
    }

    /// 带超时的发送（SO_SNDTIMEO）
    fn send_timeout(&mut self, frame: CgFrame, timeout: Duration) -> Result<(), CanError> {
        self.socket
            .set_write_timeout(timeout.max(MIN_READ_TIMEOUT))
            .map_err(CanError::Io)?;
        let result = self.send(frame);
        if let Err(e) = self.socket.set_write_timeout(None) {
            warn!("Failed to restore write timeout after send_timeout: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn can_interface_exists(interface: &str) -> bool {
        Command::new("ip")
            .args(["link", "show", interface])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// 要求 vcan0 接口存在，否则跳过测试
    macro_rules! require_vcan0 {
        () => {{
            if !can_interface_exists("vcan0") {
                eprintln!("Skipping test: vcan0 interface not available");
                return;
            }
            "vcan0"
        }};
    }

    #[test]
    fn test_open_missing_interface_fails() {
        let result = SocketCanAdapter::new("cg_no_such_if0");
        assert!(matches!(result, Err(CanError::Device(_))));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        adapter.set_read_timeout(Duration::ZERO).unwrap();
        assert_eq!(adapter.read_timeout(), MIN_READ_TIMEOUT);
    }

    #[test]
    fn test_receive_timeout_on_quiet_bus() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        // vcan0 上可能有其他测试的流量，只检查不会永久阻塞
        let start = Instant::now();
        let _ = adapter.receive_timeout(Duration::from_millis(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_send_extended_frame() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        let frame = CgFrame::new_extended(0x0300_FD01, &[0; 8]);
        assert!(adapter.send_timeout(frame, Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn test_send_standard_frame_rejected() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();
        let frame = CgFrame::new_standard(0x123, &[1, 2]);
        assert!(matches!(adapter.send(frame), Err(CanError::Device(_))));
    }
}
