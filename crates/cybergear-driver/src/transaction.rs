//! 事务引擎
//!
//! 一次事务：发送请求，然后在截止时间前反复以 `min(poll_interval, 剩余时间)`
//! 调用接收，直到某帧被 [`ReplyFilter`] 接受或截止时间到达。
//!
//! ```text
//! Idle ──send──▶ AwaitingReply ──match──▶ Matched
//!                     │  ▲                   │
//!                     │  └──── next_match ───┘
//!                     ├── deadline ──▶ TimedOut
//!                     └── cancel ────▶ Cancelled
//! ```
//!
//! 等待期间看到的每一帧都先检查告警签名（通信类型 21）：告警帧进入告警队列，
//! 永远不会被当作应答。通信类型 22 的帧直接丢弃。其他节点或其他指令的帧记为杂散帧丢弃。

use crate::bus::BusSession;
use crate::config::TransactionConfig;
use crate::error::DriverError;
use crate::metrics::BusMetrics;
use cybergear_can::CgFrame;
use cybergear_protocol::{AlarmFrame, Command, Request};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 事务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    AwaitingReply,
    Matched,
    TimedOut,
    Cancelled,
}

/// 应答匹配条件
///
/// `command` 为 `None` 时只按节点匹配（应答通信类型不固定的请求）。
/// `code` 非空时还要求数据前两字节（小端）等于该参数编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFilter {
    pub node: u8,
    pub command: Option<Command>,
    pub code: Option<u16>,
}

impl ReplyFilter {
    /// 按节点和通信类型匹配
    pub fn new(node: u8, command: Command) -> Self {
        Self {
            node,
            command: Some(command),
            code: None,
        }
    }

    /// 只按节点匹配
    pub fn node_only(node: u8) -> Self {
        Self {
            node,
            command: None,
            code: None,
        }
    }

    /// 额外要求参数编码一致
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn matches(&self, frame: &CgFrame) -> bool {
        if !frame.is_extended {
            return false;
        }
        let id = frame.arbitration_id();
        if id.source_node() != self.node {
            return false;
        }
        if self
            .command
            .is_some_and(|command| id.command().value() != command.code())
        {
            return false;
        }
        match self.code {
            Some(code) => {
                frame.len >= 2 && u16::from_le_bytes([frame.data[0], frame.data[1]]) == code
            },
            None => true,
        }
    }
}

/// 一次请求/应答交换
///
/// 借用持有总线锁的会话；交换结束（drop）后会话仍可继续使用。
pub struct Exchange<'s, 'a> {
    session: &'s mut BusSession<'a>,
    filter: ReplyFilter,
    request: Command,
    deadline: Instant,
    poll_interval: Duration,
    state: TransactionState,
}

impl<'s, 'a> Exchange<'s, 'a> {
    /// 构建并发送请求帧，进入等待状态
    ///
    /// 节点 ID 非法时不发送任何帧。取消标志已置位时同样不发送。
    pub fn begin(
        session: &'s mut BusSession<'a>,
        request: &Request,
        node: u8,
        filter: ReplyFilter,
        timeout: Duration,
        config: &TransactionConfig,
    ) -> Result<Self, DriverError> {
        let frame = request.to_frame(node, config.host_id)?;
        if session.bus().cancel_token().is_cancelled() {
            return Err(DriverError::Cancelled);
        }

        let mut exchange = Self {
            session,
            filter,
            request: request.command(),
            deadline: Instant::now(),
            poll_interval: config.poll_interval.max(Duration::from_micros(100)),
            state: TransactionState::Idle,
        };
        debug!(
            "Transaction {:?} -> node {} (timeout {:?})",
            exchange.request, node, timeout
        );
        exchange.session.send(frame, config.send_timeout)?;
        exchange.deadline = Instant::now() + timeout;
        exchange.state = TransactionState::AwaitingReply;
        Ok(exchange)
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn filter(&self) -> &ReplyFilter {
        &self.filter
    }

    /// 距截止时间的剩余时间
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// 等待下一帧匹配的应答
    ///
    /// 截止时间到达返回 `Ok(None)`（多帧读取据此决定是否使用已收集的部分）。
    pub fn next_match(&mut self) -> Result<Option<CgFrame>, DriverError> {
        self.state = TransactionState::AwaitingReply;
        loop {
            if self.session.bus().cancel_token().is_cancelled() {
                self.state = TransactionState::Cancelled;
                debug!("Transaction {:?} cancelled", self.request);
                return Err(DriverError::Cancelled);
            }

            let remaining = self.remaining();
            if remaining.is_zero() {
                self.state = TransactionState::TimedOut;
                return Ok(None);
            }

            let Some(frame) = self.session.recv(self.poll_interval.min(remaining))? else {
                continue;
            };

            if !frame.is_extended {
                self.discard_stray(&frame);
                continue;
            }

            match Command::from_code(frame.arbitration_id().command().value()) {
                Ok(Command::Alarm) => {
                    if let Ok(alarm) = AlarmFrame::try_from(frame) {
                        self.session.record_alarm(alarm);
                    }
                    continue;
                },
                Ok(Command::SetBaud) => {
                    trace!("Discarding command 22 frame 0x{:08X}", frame.id);
                    continue;
                },
                _ => {},
            }

            if self.filter.matches(&frame) {
                self.state = TransactionState::Matched;
                trace!("Transaction {:?} matched 0x{:08X}", self.request, frame.id);
                return Ok(Some(frame));
            }
            self.discard_stray(&frame);
        }
    }

    /// 等待单帧应答，超时返回 [`DriverError::Timeout`]
    pub fn wait(mut self) -> Result<CgFrame, DriverError> {
        match self.next_match()? {
            Some(frame) => Ok(frame),
            None => Err(self.timeout_error()),
        }
    }

    /// 记录一次超时并构造错误
    pub fn timeout_error(&self) -> DriverError {
        BusMetrics::inc(&self.session.bus().metrics().timeouts);
        debug!(
            "Transaction {:?} timed out waiting for node {}",
            self.request, self.filter.node
        );
        DriverError::Timeout {
            node: self.filter.node,
            command: self.request,
        }
    }

    fn discard_stray(&self, frame: &CgFrame) {
        BusMetrics::inc(&self.session.bus().metrics().stray_frames);
        warn!(
            "Discarding stray frame 0x{:08X} while waiting for {:?} from node {}",
            frame.id, self.request, self.filter.node
        );
    }
}
