//! 故障告警队列
//!
//! 事务层在等待应答期间看到的每一帧告警（通信类型 21）都会进入队列，
//! 调用方通过 [`AlarmQueue::drain`] 取走。队列不设上限，需要调用方定期读取。

use cybergear_protocol::AlarmFrame;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// 一次告警
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmEvent {
    /// 上报告警的节点
    pub node: u8,
    /// 收到时间（UNIX 纪元秒）
    pub timestamp: f64,
    /// 64 位故障字
    pub fault_word: u64,
}

impl AlarmEvent {
    pub fn from_frame(frame: AlarmFrame) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            node: frame.node,
            timestamp,
            fault_word: frame.fault_word,
        }
    }
}

/// 告警队列
///
/// 独立于总线锁：追加发生在总线临界区内，`drain` 只做一次交换，可在事务之外调用。
#[derive(Debug, Default)]
pub struct AlarmQueue {
    events: Mutex<Vec<AlarmEvent>>,
}

impl AlarmQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: AlarmEvent) {
        self.events.lock().push(event);
    }

    /// 取走全部告警（按到达顺序）
    pub fn drain(&self) -> Vec<AlarmEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
