//! Mock CAN 适配器
//!
//! 内存队列实现的 [`CanAdapter`]，用于无硬件测试。克隆出的句柄共享同一份状态，
//! 测试代码可以在适配器交给事务层之后继续注入接收帧、检查已发送帧。
//!
//! ```rust,ignore
//! use cybergear_can::{CanAdapter, CgFrame, MockCanAdapter};
//!
//! let mock = MockCanAdapter::new();
//! let mut adapter = mock.clone();
//!
//! mock.push_rx(CgFrame::new_extended(0x0200_01FD, &[0; 8]));
//! assert_eq!(adapter.receive().unwrap().id, 0x0200_01FD);
//! ```

use crate::{CanAdapter, CanError, CgFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// 空队列时单次接收的最长等待
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// 应答生成器：根据发送的帧生成随后可接收的帧
pub type Responder = Box<dyn FnMut(&CgFrame) -> Vec<CgFrame> + Send>;

#[derive(Default)]
struct MockState {
    rx_queue: VecDeque<CgFrame>,
    sent: Vec<CgFrame>,
    responder: Option<Responder>,
    fail_sends: bool,
}

/// Mock CAN 适配器
#[derive(Clone, Default)]
pub struct MockCanAdapter {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockCanAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockCanAdapter")
            .field("rx_queue", &state.rx_queue.len())
            .field("sent", &state.sent.len())
            .field("has_responder", &state.responder.is_some())
            .field("fail_sends", &state.fail_sends)
            .finish()
    }
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入一帧接收数据
    pub fn push_rx(&self, frame: CgFrame) {
        self.state.lock().rx_queue.push_back(frame);
    }

    /// 按顺序注入多帧
    pub fn push_rx_all(&self, frames: impl IntoIterator<Item = CgFrame>) {
        self.state.lock().rx_queue.extend(frames);
    }

    /// 尚未被读取的帧数
    pub fn pending_rx(&self) -> usize {
        self.state.lock().rx_queue.len()
    }

    /// 已发送帧的快照
    pub fn sent_frames(&self) -> Vec<CgFrame> {
        self.state.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// 设置应答生成器（每次发送成功后调用，返回的帧追加到接收队列）
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&CgFrame) -> Vec<CgFrame> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// 让后续发送全部失败（模拟总线故障）
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: CgFrame) -> Result<(), CanError> {
        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(CanError::BusOff);
        }
        state.sent.push(frame);
        trace!("Mock sent frame: ID=0x{:08X}, len={}", frame.id, frame.len);

        let replies = match state.responder.as_mut() {
            Some(responder) => responder(&frame),
            None => Vec::new(),
        };
        state.rx_queue.extend(replies);
        Ok(())
    }

    fn receive(&mut self) -> Result<CgFrame, CanError> {
        self.receive_timeout(IDLE_WAIT)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<CgFrame, CanError> {
        if let Some(frame) = self.state.lock().rx_queue.pop_front() {
            return Ok(frame);
        }
        // 锁外等待，避免阻塞注入方
        std::thread::sleep(timeout.min(IDLE_WAIT));
        self.state.lock().rx_queue.pop_front().ok_or(CanError::Timeout)
    }

    fn try_receive(&mut self) -> Result<Option<CgFrame>, CanError> {
        Ok(self.state.lock().rx_queue.pop_front())
    }
}
