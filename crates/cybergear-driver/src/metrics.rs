//! 总线指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线实时指标
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 发送的总帧数
    pub tx_frames: AtomicU64,
    /// 接收的总帧数（含告警与杂散帧）
    pub rx_frames: AtomicU64,
    /// 收到的告警帧数
    pub alarms: AtomicU64,
    /// 被丢弃的杂散帧数（其他节点/指令的帧）
    pub stray_frames: AtomicU64,
    /// 等待应答超时次数
    pub timeouts: AtomicU64,
    /// 传输层错误次数
    pub transport_errors: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            alarms: self.alarms.load(Ordering::Relaxed),
            stray_frames: self.stray_frames.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.tx_frames.store(0, Ordering::Relaxed);
        self.rx_frames.store(0, Ordering::Relaxed);
        self.alarms.store(0, Ordering::Relaxed);
        self.stray_frames.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub alarms: u64,
    pub stray_frames: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// 杂散帧占接收帧的百分比
    pub fn stray_rate(&self) -> f64 {
        if self.rx_frames == 0 {
            return 0.0;
        }
        (self.stray_frames as f64 / self.rx_frames as f64) * 100.0
    }
}
