//! Builder 模式实现
//!
//! 提供链式构造 [`CyberGear`] 实例的便捷方式。

use crate::bus::{Bus, BoxedAdapter, CancelToken};
use crate::config::TransactionConfig;
use crate::device::CyberGear;
use crate::error::DriverError;
use cybergear_can::CanAdapter;
use std::time::Duration;
use tracing::info;

/// 未指定接口时使用的 SocketCAN 接口
pub const DEFAULT_INTERFACE: &str = "can0";

/// CyberGear Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use cybergear_driver::CyberGearBuilder;
/// use std::time::Duration;
///
/// let motors = CyberGearBuilder::new()
///     .interface("can0")
///     .host_id(0xFD)
///     .reply_timeout(Duration::from_millis(50))
///     .build()
///     .unwrap();
/// let nodes = motors.scan().unwrap();
/// ```
#[derive(Default)]
pub struct CyberGearBuilder {
    /// SocketCAN 接口名称（如 "can0"、"vcan0"）
    interface: Option<String>,
    config: TransactionConfig,
    cancel: Option<CancelToken>,
    /// 显式指定的适配器，优先于 `interface`
    adapter: Option<BoxedAdapter>,
}

impl CyberGearBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 CAN 接口（默认 "can0"）
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// 设置主机 ID
    pub fn host_id(mut self, host_id: u8) -> Self {
        self.config.host_id = host_id;
        self
    }

    /// 设置普通请求的应答超时
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// 整体替换事务层配置
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = config;
        self
    }

    /// 使用外部取消令牌（例如由 Ctrl-C 处理器置位）
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 使用指定的 CAN 适配器（测试或自定义后端）
    pub fn adapter(mut self, adapter: impl CanAdapter + Send + 'static) -> Self {
        self.adapter = Some(Box::new(adapter));
        self
    }

    /// 构建实例
    ///
    /// # Errors
    /// - `DriverError::Can`: CAN 设备打开失败
    /// - `DriverError::InvalidInput`: 非 Linux 平台且未提供适配器
    pub fn build(self) -> Result<CyberGear, DriverError> {
        let cancel = self.cancel.unwrap_or_default();
        let adapter = match self.adapter {
            Some(adapter) => adapter,
            None => Self::open_default(self.interface.as_deref())?,
        };
        Ok(CyberGear::from_bus(
            Bus::from_boxed(adapter, cancel),
            self.config,
        ))
    }

    #[cfg(target_os = "linux")]
    fn open_default(interface: Option<&str>) -> Result<BoxedAdapter, DriverError> {
        let interface = interface.unwrap_or(DEFAULT_INTERFACE);
        let adapter = cybergear_can::SocketCanAdapter::new(interface)?;
        info!("Opened SocketCAN interface {}", interface);
        Ok(Box::new(adapter))
    }

    #[cfg(not(target_os = "linux"))]
    fn open_default(interface: Option<&str>) -> Result<BoxedAdapter, DriverError> {
        info!(
            "No CAN backend for interface {:?} on this platform",
            interface.unwrap_or(DEFAULT_INTERFACE)
        );
        Err(DriverError::InvalidInput(
            "SocketCAN is only available on Linux; supply an adapter".to_string(),
        ))
    }
}
