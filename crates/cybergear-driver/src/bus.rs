//! 总线访问控制
//!
//! 一条物理总线只有一个 [`Bus`]。每次事务从请求发出到匹配应答（或超时）
//! 都持有 [`BusSession`]，期间其他调用方阻塞在锁上，应答不会被别的事务读走。
//! 会话在离开作用域时释放锁（正常返回、错误、取消、panic 均如此）。

use crate::alarm::{AlarmEvent, AlarmQueue};
use crate::error::DriverError;
use crate::metrics::BusMetrics;
use cybergear_can::{CanAdapter, CanError, CgFrame};
use cybergear_protocol::AlarmFrame;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 装箱的 CAN 适配器
pub type BoxedAdapter = Box<dyn CanAdapter + Send>;

/// 取消令牌
///
/// 克隆共享同一个标志。事务在每次轮询前检查，置位后以 [`DriverError::Cancelled`] 结束。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 清除取消标志
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// 共享总线
pub struct Bus {
    adapter: Mutex<BoxedAdapter>,
    alarms: AlarmQueue,
    metrics: BusMetrics,
    cancel: CancelToken,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("locked", &self.adapter.is_locked())
            .field("alarms", &self.alarms.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Bus {
    pub fn new(adapter: impl CanAdapter + Send + 'static, cancel: CancelToken) -> Self {
        Self::from_boxed(Box::new(adapter), cancel)
    }

    pub fn from_boxed(adapter: BoxedAdapter, cancel: CancelToken) -> Self {
        Self {
            adapter: Mutex::new(adapter),
            alarms: AlarmQueue::new(),
            metrics: BusMetrics::new(),
            cancel,
        }
    }

    /// 获取独占会话（阻塞直到锁可用）
    pub fn session(&self) -> BusSession<'_> {
        BusSession {
            adapter: self.adapter.lock(),
            bus: self,
        }
    }

    /// 在 `timeout` 内尝试获取会话
    pub fn try_session(&self, timeout: Duration) -> Option<BusSession<'_>> {
        self.adapter
            .try_lock_for(timeout)
            .map(|adapter| BusSession { adapter, bus: self })
    }

    /// 当前是否有事务持有总线
    pub fn is_busy(&self) -> bool {
        self.adapter.is_locked()
    }

    pub fn alarms(&self) -> &AlarmQueue {
        &self.alarms
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// 持有总线锁的会话
pub struct BusSession<'a> {
    adapter: MutexGuard<'a, BoxedAdapter>,
    bus: &'a Bus,
}

impl<'a> BusSession<'a> {
    pub fn bus(&self) -> &'a Bus {
        self.bus
    }

    /// 发送一帧
    pub fn send(&mut self, frame: CgFrame, timeout: Duration) -> Result<(), DriverError> {
        match self.adapter.send_timeout(frame, timeout) {
            Ok(()) => {
                BusMetrics::inc(&self.bus.metrics.tx_frames);
                trace!("TX: id=0x{:08X} data={:02X?}", frame.id, frame.data_slice());
                Ok(())
            },
            Err(e) => {
                BusMetrics::inc(&self.bus.metrics.transport_errors);
                warn!("Failed to send frame 0x{:08X}: {}", frame.id, e);
                Err(e.into())
            },
        }
    }

    /// 接收一帧，`timeout` 内无帧返回 `Ok(None)`
    pub fn recv(&mut self, timeout: Duration) -> Result<Option<CgFrame>, DriverError> {
        match self.adapter.receive_timeout(timeout) {
            Ok(frame) => {
                BusMetrics::inc(&self.bus.metrics.rx_frames);
                trace!("RX: id=0x{:08X} data={:02X?}", frame.id, frame.data_slice());
                Ok(Some(frame))
            },
            Err(CanError::Timeout) => Ok(None),
            Err(e) => {
                BusMetrics::inc(&self.bus.metrics.transport_errors);
                warn!("Receive failed: {}", e);
                Err(e.into())
            },
        }
    }

    /// 记录一帧告警
    pub(crate) fn record_alarm(&self, frame: AlarmFrame) {
        BusMetrics::inc(&self.bus.metrics.alarms);
        warn!(
            "Alarm from node {}: fault word 0x{:016X}",
            frame.node, frame.fault_word
        );
        self.bus.alarms.push(AlarmEvent::from_frame(frame));
    }

    /// 丢弃接收缓冲中的所有帧（告警帧仍进入告警队列）
    ///
    /// 最多持续 `limit`，返回丢弃的帧数。
    pub fn flush(&mut self, limit: Duration) -> usize {
        let deadline = Instant::now() + limit;
        let mut discarded = 0;
        while Instant::now() < deadline {
            match self.adapter.try_receive() {
                Ok(Some(frame)) => {
                    BusMetrics::inc(&self.bus.metrics.rx_frames);
                    if let Ok(alarm) = AlarmFrame::try_from(frame) {
                        self.record_alarm(alarm);
                    } else {
                        discarded += 1;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    BusMetrics::inc(&self.bus.metrics.transport_errors);
                    warn!("Receive failed while flushing: {}", e);
                    break;
                },
            }
        }
        if discarded > 0 {
            debug!("Flushed {} pending frames", discarded);
        }
        discarded
    }
}
