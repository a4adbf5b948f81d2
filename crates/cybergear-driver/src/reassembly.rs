//! 多帧重组
//!
//! 只用于 ReadConfig（通信类型 9）和 ReadRawConfig（通信类型 19）。
//!
//! ReadConfig 应答的每一帧携带 `编码 | 类型标签 | 序号 | ≤4 字节数据`。
//! 定长类型一帧完成；字符串类型（标签 0x0A）把同一编码的连续帧拼接起来，
//! 直到达到帧数上限或截止时间到达（已收到至少一帧时解码已收集部分）。
//! NUL 不结束读取，设备在 NUL 之后仍会补发填充帧。

use crate::error::DriverError;
use crate::transaction::Exchange;
use cybergear_protocol::{ConfigChunk, ParamValue, RawConfigChunk, WireType};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

/// 字符串在第一个 NUL 处截断，非法 UTF-8 按替换字符解码
pub fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// ============================================================================
// ReadConfig
// ============================================================================

/// ReadConfig 应答重组器
#[derive(Debug)]
pub struct ConfigReassembler {
    code: u16,
    max_string_frames: usize,
    /// 已接收的字符串帧数（0 表示尚未开始）
    frames: usize,
    buf: SmallVec<[u8; 16]>,
}

impl ConfigReassembler {
    pub fn new(code: u16, max_string_frames: usize) -> Self {
        Self {
            code,
            max_string_frames: max_string_frames.max(1),
            frames: 0,
            buf: SmallVec::new(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// 已接收的字符串帧数
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// 处理一帧，完成时返回值
    ///
    /// 编码不同的帧（上一次请求的迟到应答）被忽略，不影响已收集的数据。
    pub fn accept(&mut self, chunk: &ConfigChunk) -> Result<Option<ParamValue>, DriverError> {
        if chunk.code != self.code {
            trace!(
                "Ignoring ReadConfig chunk for 0x{:04X} (want 0x{:04X})",
                chunk.code, self.code
            );
            return Ok(None);
        }

        let wire_type = chunk.wire_type()?;
        if !wire_type.is_string() {
            if self.frames > 0 {
                let reason = format!(
                    "tag changed to {:?} after {} string frame(s)",
                    wire_type, self.frames
                );
                self.buf.clear();
                self.frames = 0;
                return Err(DriverError::Reassembly {
                    code: self.code,
                    reason,
                });
            }
            return Ok(Some(ParamValue::decode_le(
                wire_type,
                chunk.padded_payload(),
            )?));
        }

        self.frames += 1;
        self.buf.extend_from_slice(chunk.payload());
        trace!(
            "ReadConfig 0x{:04X}: string frame {} (seq {}), {} bytes",
            self.code,
            self.frames,
            chunk.sequence,
            self.buf.len()
        );

        if self.frames >= self.max_string_frames {
            return Ok(Some(self.take_string()));
        }
        Ok(None)
    }

    /// 截止时间到达时的结果：已有字符串帧则解码，否则为 `None`
    pub fn finish_on_deadline(&mut self) -> Option<ParamValue> {
        if self.frames == 0 {
            return None;
        }
        warn!(
            "ReadConfig 0x{:04X}: deadline elapsed after {} string frame(s), using partial value",
            self.code, self.frames
        );
        Some(self.take_string())
    }

    fn take_string(&mut self) -> ParamValue {
        let text = decode_string(&self.buf);
        self.buf.clear();
        self.frames = 0;
        ParamValue::Str(text)
    }
}

/// 在已发送 ReadConfig 请求的交换上读取一个配置区参数
pub fn read_config_value(
    exchange: &mut Exchange<'_, '_>,
    code: u16,
    max_string_frames: usize,
) -> Result<ParamValue, DriverError> {
    let mut reassembler = ConfigReassembler::new(code, max_string_frames);
    loop {
        match exchange.next_match()? {
            Some(frame) => {
                let chunk = ConfigChunk::try_from(frame)?;
                if let Some(value) = reassembler.accept(&chunk)? {
                    debug!("ReadConfig 0x{:04X} = {}", code, value);
                    return Ok(value);
                }
            },
            None => {
                return match reassembler.finish_on_deadline() {
                    Some(value) => Ok(value),
                    None => {
                        warn!("ReadConfig 0x{:04X}: no reply before deadline", code);
                        Err(exchange.timeout_error())
                    },
                };
            },
        }
    }
}

// ============================================================================
// ReadRawConfig
// ============================================================================

/// 原始配置区读取结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawConfigDump {
    /// 按到达顺序拼接的数据
    pub bytes: Vec<u8>,
    /// 是否收到结束帧
    pub complete: bool,
}

/// ReadRawConfig 流重组器
#[derive(Debug, Default)]
pub struct RawConfigAssembler {
    bytes: Vec<u8>,
    frames: usize,
}

impl RawConfigAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一帧，收到结束帧时返回 `true`
    pub fn accept(&mut self, chunk: &RawConfigChunk) -> bool {
        if chunk.is_terminal {
            return true;
        }
        self.frames += 1;
        self.bytes.extend_from_slice(chunk.payload());
        false
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn finish(self, complete: bool) -> RawConfigDump {
        RawConfigDump {
            bytes: self.bytes,
            complete,
        }
    }
}

/// 在已发送 ReadRawConfig 请求的交换上读取整个原始配置区
///
/// 截止时间到达但已有数据时返回 `complete == false`，完全没有数据时为超时。
pub fn read_raw_config(exchange: &mut Exchange<'_, '_>) -> Result<RawConfigDump, DriverError> {
    let mut assembler = RawConfigAssembler::new();
    loop {
        match exchange.next_match()? {
            Some(frame) => {
                let chunk = RawConfigChunk::try_from(frame)?;
                if assembler.accept(&chunk) {
                    debug!(
                        "ReadRawConfig complete: {} frame(s)",
                        assembler.frames()
                    );
                    return Ok(assembler.finish(true));
                }
            },
            None if assembler.frames() > 0 => {
                warn!(
                    "ReadRawConfig: deadline elapsed after {} frame(s) without end marker",
                    assembler.frames()
                );
                return Ok(assembler.finish(false));
            },
            None => return Err(exchange.timeout_error()),
        }
    }
}

/// 线上类型是否与参数表声明一致（不一致时以线上标签为准）
pub(crate) fn check_declared_type(code: u16, declared: WireType, value: &ParamValue) {
    if value.wire_type() != declared {
        warn!(
            "Parameter 0x{:04X} declared as {:?} but device reported {:?}",
            code,
            declared,
            value.wire_type()
        );
    }
}
