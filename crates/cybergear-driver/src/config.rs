//! 事务层配置

use cybergear_protocol::DEFAULT_HOST_ID;
use std::time::Duration;

/// 事务层配置
///
/// 超时都是单次尝试的上限，事务层不做自动重试。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// 主机 ID（请求帧 option 低 8 位）
    pub host_id: u8,
    /// 普通请求的应答超时
    pub reply_timeout: Duration,
    /// ReadConfig（含多帧字符串）的总超时
    pub config_read_timeout: Duration,
    /// ReadRawConfig 流式读取的总超时
    pub raw_dump_timeout: Duration,
    /// 发送超时
    pub send_timeout: Duration,
    /// 单次接收等待的上限（取消检查粒度）
    pub poll_interval: Duration,
    /// 字符串参数最多重组的帧数
    pub max_string_frames: usize,
    /// 清空接收缓冲的时间上限
    pub flush_limit: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            host_id: DEFAULT_HOST_ID,
            reply_timeout: Duration::from_millis(50),
            config_read_timeout: Duration::from_millis(100),
            raw_dump_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
            max_string_frames: 3,
            flush_limit: Duration::from_secs(1),
        }
    }
}

impl TransactionConfig {
    /// 设置主机 ID
    pub fn with_host_id(mut self, host_id: u8) -> Self {
        self.host_id = host_id;
        self
    }

    /// 设置普通请求的应答超时
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}
