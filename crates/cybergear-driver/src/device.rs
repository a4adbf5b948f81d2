//! 设备接口
//!
//! [`CyberGear`] 把高层操作翻译成单次事务。所有方法只需要 `&self`，
//! 多个线程可以共享同一个实例，事务之间由总线锁串行化。

use crate::alarm::AlarmEvent;
use crate::bus::{Bus, BusSession, CancelToken};
use crate::config::TransactionConfig;
use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use crate::reassembly::{self, RawConfigDump};
use crate::transaction::{Exchange, ReplyFilter};
use cybergear_can::{CanAdapter, CgFrame};
use cybergear_protocol::{
    Baud, Command, DeviceUid, Feedback, MAX_NODE_ID, MotionCommand, ParamReadReply, ParamSpace,
    ParamValue, ParameterDescriptor, ParameterRegistry, RUN_MODE_CODE, RawMotionCommand, Request,
    RunMode, WireType,
};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 参数键：名称或编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKey<'a> {
    Name(&'a str),
    Code(u16),
}

impl<'a> From<&'a str> for ParamKey<'a> {
    fn from(name: &'a str) -> Self {
        ParamKey::Name(name)
    }
}

impl<'a> From<&'a String> for ParamKey<'a> {
    fn from(name: &'a String) -> Self {
        ParamKey::Name(name)
    }
}

impl From<u16> for ParamKey<'_> {
    fn from(code: u16) -> Self {
        ParamKey::Code(code)
    }
}

impl From<&'static ParameterDescriptor> for ParamKey<'_> {
    fn from(descriptor: &'static ParameterDescriptor) -> Self {
        ParamKey::Code(descriptor.code)
    }
}

impl fmt::Display for ParamKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Name(name) => f.write_str(name),
            ParamKey::Code(code) => write!(f, "0x{:04X}", code),
        }
    }
}

/// 参数表查找，未知键返回 [`DriverError::UnknownParameter`]
pub fn resolve_param(key: ParamKey<'_>) -> Result<&'static ParameterDescriptor, DriverError> {
    let registry = ParameterRegistry::global();
    let descriptor = match key {
        ParamKey::Name(name) => registry.by_name(name),
        ParamKey::Code(code) => registry.by_code(code),
    };
    descriptor.ok_or_else(|| DriverError::UnknownParameter(key.to_string()))
}

fn check_node(node: u8) -> Result<u8, DriverError> {
    if node > MAX_NODE_ID {
        return Err(DriverError::InvalidNodeId { node });
    }
    Ok(node)
}

/// CyberGear 电机总线客户端
#[derive(Debug)]
pub struct CyberGear {
    bus: Bus,
    config: TransactionConfig,
}

impl CyberGear {
    /// 使用默认配置创建
    pub fn new(adapter: impl CanAdapter + Send + 'static) -> Self {
        Self::with_config(adapter, TransactionConfig::default(), CancelToken::new())
    }

    /// 使用指定配置和取消令牌创建
    ///
    /// 创建时清空一次接收缓冲（上限 `config.flush_limit`）。
    pub fn with_config(
        adapter: impl CanAdapter + Send + 'static,
        config: TransactionConfig,
        cancel: CancelToken,
    ) -> Self {
        Self::from_bus(Bus::new(adapter, cancel), config)
    }

    pub(crate) fn from_bus(bus: Bus, config: TransactionConfig) -> Self {
        let device = Self { bus, config };
        device.flush_rx();
        device
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn cancel_token(&self) -> &CancelToken {
        self.bus.cancel_token()
    }

    /// 单帧事务：发送请求，等待匹配的一帧应答
    fn transact(
        &self,
        node: u8,
        request: Request,
        filter: ReplyFilter,
    ) -> Result<CgFrame, DriverError> {
        let mut session = self.bus.session();
        self.exchange(&mut session, node, &request, filter, self.config.reply_timeout)?
            .wait()
    }

    fn exchange<'s, 'a>(
        &self,
        session: &'s mut BusSession<'a>,
        node: u8,
        request: &Request,
        filter: ReplyFilter,
        timeout: Duration,
    ) -> Result<Exchange<'s, 'a>, DriverError> {
        Exchange::begin(session, request, node, filter, timeout, &self.config)
    }

    /// 应答为电机反馈（通信类型 2）的请求
    fn feedback_transaction(&self, node: u8, request: Request) -> Result<Feedback, DriverError> {
        check_node(node)?;
        let frame = self.transact(node, request, ReplyFilter::new(node, Command::Feedback))?;
        Ok(Feedback::try_from(frame)?)
    }

    // ========================================================================
    // 设备标识
    // ========================================================================

    /// 读取 64 位设备 ID
    pub fn get_uid(&self, node: u8) -> Result<u64, DriverError> {
        check_node(node)?;
        let frame = self.transact(node, Request::GetUid, ReplyFilter::new(node, Command::GetUid))?;
        Ok(DeviceUid::try_from(frame)?.uid)
    }

    /// 扫描整条总线（0..=0x7F）
    pub fn scan(&self) -> Result<Vec<u8>, DriverError> {
        self.scan_range(0..=MAX_NODE_ID)
    }

    /// 按升序探测 `range` 内的节点，超时即视为不存在
    pub fn scan_range(&self, range: RangeInclusive<u8>) -> Result<Vec<u8>, DriverError> {
        check_node(*range.end())?;
        let mut found = Vec::new();
        for node in range {
            match self.get_uid(node) {
                Ok(uid) => {
                    debug!("Node {} present (uid 0x{:016X})", node, uid);
                    found.push(node);
                },
                Err(DriverError::Timeout { .. }) => {},
                Err(DriverError::Protocol(e)) => {
                    // 有应答即说明节点存在
                    warn!("Node {} replied with malformed frame: {}", node, e);
                    found.push(node);
                },
                Err(e) => return Err(e),
            }
        }
        info!("Scan found {} node(s): {:?}", found.len(), found);
        Ok(found)
    }

    // ========================================================================
    // 运行控制
    // ========================================================================

    /// 使能
    pub fn enable(&self, node: u8) -> Result<Feedback, DriverError> {
        self.feedback_transaction(node, Request::Enable)
    }

    /// 停止（`clear_fault` 为 true 时同时清除故障）
    pub fn disable(&self, node: u8, clear_fault: bool) -> Result<Feedback, DriverError> {
        self.feedback_transaction(node, Request::Disable { clear_fault })
    }

    /// 把当前位置设为机械零位
    pub fn set_zero(&self, node: u8) -> Result<Feedback, DriverError> {
        self.feedback_transaction(node, Request::SetZero)
    }

    /// 请求一帧反馈
    pub fn feedback(&self, node: u8) -> Result<Feedback, DriverError> {
        self.feedback_transaction(node, Request::Feedback)
    }

    /// 运控指令（物理量，超限分量饱和）
    pub fn control(&self, node: u8, command: MotionCommand) -> Result<Feedback, DriverError> {
        self.control_raw(node, command.to_raw())
    }

    /// 运控指令（总线值）
    pub fn control_raw(&self, node: u8, raw: RawMotionCommand) -> Result<Feedback, DriverError> {
        self.feedback_transaction(node, Request::Control(raw))
    }

    /// 修改节点 ID，应答来自新 ID
    pub fn change_id(&self, node: u8, new_node: u8) -> Result<u64, DriverError> {
        check_node(node)?;
        check_node(new_node)?;
        let frame = self.transact(
            node,
            Request::ChangeId { new_node },
            ReplyFilter::node_only(new_node),
        )?;
        let command = frame.arbitration_id().command().value();
        if command != Command::GetUid.code() {
            return Err(DriverError::UnexpectedReply {
                node: new_node,
                expected: Command::GetUid,
                actual: command,
            });
        }
        let uid = DeviceUid::try_from(frame)?.uid;
        info!("Node {} changed id to {}", node, new_node);
        Ok(uid)
    }

    /// 修改 CAN 波特率
    pub fn set_baud(&self, node: u8, baud: Baud) -> Result<u64, DriverError> {
        check_node(node)?;
        let frame = self.transact(
            node,
            Request::SetBaud(baud),
            ReplyFilter::new(node, Command::GetUid),
        )?;
        info!("Node {} baud set to {} bit/s", node, baud.bitrate());
        Ok(DeviceUid::try_from(frame)?.uid)
    }

    /// 按选择值（1..=4）修改波特率，其他值在发送前被拒绝
    pub fn set_baud_selector(&self, node: u8, selector: u8) -> Result<u64, DriverError> {
        let baud = Baud::from_selector(selector).map_err(|_| DriverError::InvalidBaud(selector))?;
        self.set_baud(node, baud)
    }

    /// 切换运行模式：先停止电机，停止成功后写入 `run_mode`
    pub fn set_run_mode(&self, node: u8, mode: RunMode) -> Result<Feedback, DriverError> {
        self.disable(node, false)?;
        self.write_param(node, RUN_MODE_CODE, ParamValue::U8(mode.code()))
    }

    // ========================================================================
    // 参数读写
    // ========================================================================

    /// 读取参数
    ///
    /// 配置区通过 ReadConfig（可多帧），参数区通过 ReadParam。
    pub fn read_param<'k>(
        &self,
        node: u8,
        key: impl Into<ParamKey<'k>>,
    ) -> Result<(&'static ParameterDescriptor, ParamValue), DriverError> {
        check_node(node)?;
        let descriptor = resolve_param(key.into())?;
        let value = match descriptor.space() {
            ParamSpace::Config => self.read_config(node, descriptor)?,
            ParamSpace::Parameter => self.read_parameter(node, descriptor)?,
        };
        Ok((descriptor, value))
    }

    fn read_config(
        &self,
        node: u8,
        descriptor: &ParameterDescriptor,
    ) -> Result<ParamValue, DriverError> {
        let code = descriptor.code;
        let mut session = self.bus.session();
        let mut exchange = self.exchange(
            &mut session,
            node,
            &Request::ReadConfig { code },
            ReplyFilter::new(node, Command::ReadConfig).with_code(code),
            self.config.config_read_timeout,
        )?;
        let value =
            reassembly::read_config_value(&mut exchange, code, self.config.max_string_frames)?;
        reassembly::check_declared_type(code, descriptor.wire_type, &value);
        Ok(value)
    }

    fn read_parameter(
        &self,
        node: u8,
        descriptor: &ParameterDescriptor,
    ) -> Result<ParamValue, DriverError> {
        let code = descriptor.code;
        let frame = self.transact(
            node,
            Request::ReadParam { code },
            ReplyFilter::new(node, Command::ReadParam).with_code(code),
        )?;
        let reply = ParamReadReply::try_from(frame)?;
        Ok(reply.value(descriptor.wire_type)?)
    }

    /// 写入参数，值的类型必须与参数表一致
    pub fn write_param<'k>(
        &self,
        node: u8,
        key: impl Into<ParamKey<'k>>,
        value: ParamValue,
    ) -> Result<Feedback, DriverError> {
        check_node(node)?;
        let descriptor = resolve_param(key.into())?;
        if descriptor.wire_type == WireType::Str {
            return Err(cybergear_protocol::ProtocolError::NotWritable(WireType::Str).into());
        }
        if value.wire_type() != descriptor.wire_type {
            return Err(DriverError::InvalidInput(format!(
                "{} expects {:?}, got {:?}",
                descriptor.name,
                descriptor.wire_type,
                value.wire_type()
            )));
        }

        let request = Request::WriteParam {
            code: descriptor.code,
            value: value.encode_le()?,
        };
        let feedback = self.feedback_transaction(node, request)?;
        debug!("Node {}: {} <- {}", node, descriptor.name, value);
        Ok(feedback)
    }

    /// 写入数值参数，数值按参数表声明的类型转换
    pub fn set_param<'k>(
        &self,
        node: u8,
        key: impl Into<ParamKey<'k>>,
        value: f64,
    ) -> Result<Feedback, DriverError> {
        let descriptor = resolve_param(key.into())?;
        let value = ParamValue::coerce(descriptor.wire_type, value)?;
        self.write_param(node, descriptor, value)
    }

    /// 读取原始配置区
    pub fn read_raw_config(&self, node: u8) -> Result<RawConfigDump, DriverError> {
        check_node(node)?;
        let mut session = self.bus.session();
        let mut exchange = self.exchange(
            &mut session,
            node,
            &Request::ReadRawConfig,
            ReplyFilter::new(node, Command::ReadRawConfig),
            self.config.raw_dump_timeout,
        )?;
        reassembly::read_raw_config(&mut exchange)
    }

    /// 依次读取参数表中的全部参数
    ///
    /// 单个参数失败不影响其余参数；取消或传输故障立即结束。
    pub fn dump(
        &self,
        node: u8,
    ) -> Result<Vec<(&'static ParameterDescriptor, Result<ParamValue, DriverError>)>, DriverError>
    {
        check_node(node)?;
        let registry = ParameterRegistry::global();
        let mut out = Vec::with_capacity(registry.len());
        for descriptor in registry.iter() {
            match self.read_param(node, descriptor) {
                Ok((_, value)) => out.push((descriptor, Ok(value))),
                Err(e @ (DriverError::Cancelled | DriverError::Can(_))) => return Err(e),
                Err(e) => out.push((descriptor, Err(e))),
            }
        }
        Ok(out)
    }

    // ========================================================================
    // 辅助
    // ========================================================================

    /// 取走全部告警
    pub fn alarms(&self) -> Vec<AlarmEvent> {
        self.bus.alarms().drain()
    }

    /// 丢弃接收缓冲中的帧，返回丢弃数
    pub fn flush_rx(&self) -> usize {
        self.bus.session().flush(self.config.flush_limit)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.bus.metrics().snapshot()
    }
}
