//! 参数表定义
//!
//! 电机参数分为两个地址空间：
//!
//! - 配置区（编码 < 0x7000）：通过 ReadConfig（通信类型 9）读取，支持多帧字符串
//! - 参数区（编码 >= 0x7000）：通过 ReadParam / WriteParam（通信类型 17/18）读写，
//!   单帧、固定 4 字节数值
//!
//! 参数表是静态的外部参考数据，启动后只读。按编码和按名称的查找表在首次访问时
//! 构建一次。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// 参数区起始编码
pub const PARAM_SPACE_BASE: u16 = 0x7000;

/// 运行模式参数编码
pub const RUN_MODE_CODE: u16 = 0x7005;

// ============================================================================
// 线上数据类型
// ============================================================================

/// 参数的线上数据类型（取值即 ReadConfig 应答中的类型标签）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum WireType {
    U8 = 0x00,
    U16 = 0x02,
    I16 = 0x03,
    U32 = 0x04,
    I32 = 0x05,
    F32 = 0x06,
    Str = 0x0A,
}

impl WireType {
    /// 由 ReadConfig 类型标签解析
    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        WireType::try_from(tag).map_err(|_| ProtocolError::UnknownWireType(tag))
    }

    /// 类型标签
    pub fn tag(self) -> u8 {
        self.into()
    }

    /// 定长类型的有效字节数（字符串返回 `None`）
    pub fn width(self) -> Option<usize> {
        match self {
            WireType::U8 => Some(1),
            WireType::U16 | WireType::I16 => Some(2),
            WireType::U32 | WireType::I32 | WireType::F32 => Some(4),
            WireType::Str => None,
        }
    }

    /// 是否为变长字符串
    pub fn is_string(self) -> bool {
        matches!(self, WireType::Str)
    }
}

// ============================================================================
// 参数值
// ============================================================================

/// 参数值
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    U8(u8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    Str(String),
}

impl ParamValue {
    /// 线上数据类型
    pub fn wire_type(&self) -> WireType {
        match self {
            ParamValue::U8(_) => WireType::U8,
            ParamValue::U16(_) => WireType::U16,
            ParamValue::I16(_) => WireType::I16,
            ParamValue::U32(_) => WireType::U32,
            ParamValue::I32(_) => WireType::I32,
            ParamValue::F32(_) => WireType::F32,
            ParamValue::Str(_) => WireType::Str,
        }
    }

    /// 从小端 4 字节数值字段解码定长类型
    ///
    /// 字符串类型需要多帧重组，不能在这里解码。
    pub fn decode_le(wire_type: WireType, raw: [u8; 4]) -> Result<Self, ProtocolError> {
        let value = match wire_type {
            WireType::U8 => ParamValue::U8(raw[0]),
            WireType::U16 => ParamValue::U16(u16::from_le_bytes([raw[0], raw[1]])),
            WireType::I16 => ParamValue::I16(i16::from_le_bytes([raw[0], raw[1]])),
            WireType::U32 => ParamValue::U32(u32::from_le_bytes(raw)),
            WireType::I32 => ParamValue::I32(i32::from_le_bytes(raw)),
            WireType::F32 => ParamValue::F32(f32::from_le_bytes(raw)),
            WireType::Str => return Err(ProtocolError::NotFixedWidth(WireType::Str)),
        };
        Ok(value)
    }

    /// 编码为小端 4 字节数值字段（高位补零）
    pub fn encode_le(&self) -> Result<[u8; 4], ProtocolError> {
        let mut raw = [0u8; 4];
        match self {
            ParamValue::U8(v) => raw[0] = *v,
            ParamValue::U16(v) => raw[..2].copy_from_slice(&v.to_le_bytes()),
            ParamValue::I16(v) => raw[..2].copy_from_slice(&v.to_le_bytes()),
            ParamValue::U32(v) => raw = v.to_le_bytes(),
            ParamValue::I32(v) => raw = v.to_le_bytes(),
            ParamValue::F32(v) => raw = v.to_le_bytes(),
            ParamValue::Str(_) => return Err(ProtocolError::NotWritable(WireType::Str)),
        }
        Ok(raw)
    }

    /// 把数值强制转换为指定线上类型
    ///
    /// 整数类型要求取值为整数且落在类型范围内。
    pub fn coerce(wire_type: WireType, value: f64) -> Result<Self, ProtocolError> {
        let out_of_range = || ProtocolError::ValueOutOfRange { wire_type, value };
        let integral = |min: f64, max: f64| -> Result<f64, ProtocolError> {
            if value.fract() != 0.0 || value < min || value > max {
                Err(out_of_range())
            } else {
                Ok(value)
            }
        };

        let value = match wire_type {
            WireType::U8 => ParamValue::U8(integral(0.0, u8::MAX as f64)? as u8),
            WireType::U16 => ParamValue::U16(integral(0.0, u16::MAX as f64)? as u16),
            WireType::I16 => {
                ParamValue::I16(integral(i16::MIN as f64, i16::MAX as f64)? as i16)
            },
            WireType::U32 => ParamValue::U32(integral(0.0, u32::MAX as f64)? as u32),
            WireType::I32 => {
                ParamValue::I32(integral(i32::MIN as f64, i32::MAX as f64)? as i32)
            },
            WireType::F32 => {
                if !value.is_finite() {
                    return Err(out_of_range());
                }
                ParamValue::F32(value as f32)
            },
            WireType::Str => return Err(ProtocolError::NotWritable(WireType::Str)),
        };
        Ok(value)
    }

    /// 数值类型转换为 f64（字符串返回 `None`）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::U8(v) => Some(*v as f64),
            ParamValue::U16(v) => Some(*v as f64),
            ParamValue::I16(v) => Some(*v as f64),
            ParamValue::U32(v) => Some(*v as f64),
            ParamValue::I32(v) => Some(*v as f64),
            ParamValue::F32(v) => Some(*v as f64),
            ParamValue::Str(_) => None,
        }
    }

    /// 字符串内容
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::U8(v) => write!(f, "{}", v),
            ParamValue::U16(v) => write!(f, "{}", v),
            ParamValue::I16(v) => write!(f, "{}", v),
            ParamValue::U32(v) => write!(f, "{}", v),
            ParamValue::I32(v) => write!(f, "{}", v),
            ParamValue::F32(v) => write!(f, "{:.3}", v),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// 参数描述
// ============================================================================

/// 参数所在地址空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSpace {
    /// 配置区（ReadConfig，可多帧）
    Config,
    /// 参数区（ReadParam / WriteParam，单帧）
    Parameter,
}

/// 参数描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub code: u16,
    pub wire_type: WireType,
    pub unit: &'static str,
}

impl ParameterDescriptor {
    pub const fn new(
        name: &'static str,
        code: u16,
        wire_type: WireType,
        unit: &'static str,
    ) -> Self {
        Self {
            name,
            code,
            wire_type,
            unit,
        }
    }

    /// 地址空间
    pub fn space(&self) -> ParamSpace {
        space_of(self.code)
    }
}

/// 编码所在地址空间
pub fn space_of(code: u16) -> ParamSpace {
    if code >= PARAM_SPACE_BASE {
        ParamSpace::Parameter
    } else {
        ParamSpace::Config
    }
}

use WireType::{F32, I16, I32, Str, U8, U16, U32};

const fn p(
    name: &'static str,
    code: u16,
    wire_type: WireType,
    unit: &'static str,
) -> ParameterDescriptor {
    ParameterDescriptor::new(name, code, wire_type, unit)
}

/// 参数表（固件 1.2.1.5 及以上）
pub static PARAMETERS: &[ParameterDescriptor] = &[
    // 设备信息（字符串）
    p("Name", 0x0000, Str, ""),
    p("BarCode", 0x0001, Str, ""),
    p("BootCodeVersion", 0x1000, Str, ""),
    p("BootBuildDate", 0x1001, Str, ""),
    p("BootBuildTime", 0x1002, Str, ""),
    p("AppCodeVersion", 0x1003, Str, ""),
    p("AppGitVersion", 0x1004, Str, ""),
    p("AppBuildDate", 0x1005, Str, ""),
    p("AppBuildTime", 0x1006, Str, ""),
    p("AppCodeName", 0x1007, Str, ""),
    // 配置参数
    p("echoPara1", 0x2000, U16, ""),
    p("echoPara2", 0x2001, U16, ""),
    p("echoPara3", 0x2002, U16, ""),
    p("echoPara4", 0x2003, U16, ""),
    p("echoFreHz", 0x2004, U32, ""),
    p("MechOffset", 0x2005, F32, ""),
    p("MechPos_init", 0x2006, F32, ""),
    p("limit_torque", 0x2007, F32, ""),
    p("I_FW_MAX", 0x2008, F32, ""),
    p("motor_index", 0x2009, U8, ""),
    p("CAN_ID", 0x200a, U8, ""),
    p("CAN_MASTER", 0x200b, U8, ""),
    p("CAN_TIMEOUT", 0x200c, U32, ""),
    p("motorOverTemp", 0x200d, I16, "*10degC"),
    p("overTempTime", 0x200e, U32, ""),
    p("GearRatio", 0x200f, F32, ""),
    p("Tq_caliType", 0x2010, U8, ""),
    p("cur_filt_gain", 0x2011, F32, ""),
    p("cur_kp", 0x2012, F32, ""),
    p("cur_ki", 0x2013, F32, ""),
    p("spd_kp", 0x2014, F32, ""),
    p("spd_ki", 0x2015, F32, ""),
    p("loc_kp", 0x2016, F32, ""),
    p("spd_filt_gain", 0x2017, F32, ""),
    p("limit_spd", 0x2018, F32, ""),
    p("limit_cur", 0x2019, F32, ""),
    // 运行状态
    p("timeUse0", 0x3000, U16, ""),
    p("timeUse1", 0x3001, U16, ""),
    p("timeUse2", 0x3002, U16, ""),
    p("timeUse3", 0x3003, U16, ""),
    p("encoderRaw", 0x3004, I16, ""),
    p("mcuTemp", 0x3005, I16, "*10degC"),
    p("motorTemp", 0x3006, I16, "*10degC"),
    p("vBus", 0x3007, U16, "mV"),
    p("adc1Offset", 0x3008, I32, ""),
    p("adc2Offset", 0x3009, I32, ""),
    p("adc1Raw", 0x300a, U16, ""),
    p("adc2Raw", 0x300b, U16, ""),
    p("VBUS", 0x300c, F32, "V"),
    p("cmdId", 0x300d, F32, "A"),
    p("cmdIq", 0x300e, F32, "A"),
    p("cmdlocref", 0x300f, F32, "rad"),
    p("cmdspdref", 0x3010, F32, "rad/s"),
    p("cmdTorque", 0x3011, F32, ""),
    p("cmdPos", 0x3012, F32, "rad"),
    p("cmdVel", 0x3013, F32, "rad/s"),
    p("rotation", 0x3014, I16, ""),
    p("modPos", 0x3015, F32, "rad"),
    p("mechPos", 0x3016, F32, "rad"),
    p("mechVel", 0x3017, F32, "rad/s"),
    p("elecPos", 0x3018, F32, ""),
    p("ia", 0x3019, F32, "A"),
    p("ib", 0x301a, F32, "A"),
    p("ic", 0x301b, F32, "A"),
    p("tick", 0x301c, U32, ""),
    p("phaseOrder", 0x301d, U8, ""),
    p("iqf", 0x301e, F32, "A"),
    p("boardTemp", 0x301f, I16, "*10degC"),
    p("iq", 0x3020, F32, "A"),
    p("id", 0x3021, F32, "A"),
    p("faultSta", 0x3022, U32, ""),
    p("warnSta", 0x3023, U32, ""),
    p("drv_fault", 0x3024, U32, ""),
    p("drv_temp", 0x3025, I16, ""),
    p("Uq", 0x3026, F32, ""),
    p("Ud", 0x3027, F32, ""),
    p("dtc_u", 0x3028, F32, ""),
    p("dtc_v", 0x3029, F32, ""),
    p("dtc_w", 0x302a, F32, ""),
    p("v_bus", 0x302b, F32, "V"),
    p("v_ref", 0x302c, F32, "V"),
    p("torque_fdb", 0x302d, F32, "Nm"),
    p("rated_i", 0x302e, F32, "A"),
    p("limit_i", 0x302f, F32, "A"),
    // 参数区（可读写）
    p("run_mode", RUN_MODE_CODE, U8, ""),
    p("iq_ref", 0x7006, F32, "A"),
    p("spd_ref", 0x700a, F32, "rad/s"),
    p("limit_torque_2", 0x700b, F32, "Nm"),
    p("cur_kp_2", 0x7010, F32, ""),
    p("cur_ki_2", 0x7011, F32, ""),
    p("cur_filt_gain_2", 0x7014, F32, ""),
    p("loc_ref", 0x7016, F32, "rad"),
    p("limit_spd_2", 0x7017, F32, "rad/s"),
    p("limit_cur_2", 0x7018, F32, "A"),
    p("mechPos_2", 0x7019, F32, "rad"),
    p("iqf_2", 0x701a, F32, "A"),
    p("mechVel_2", 0x701b, F32, "rad/s"),
    p("VBUS_2", 0x701c, F32, "V"),
    p("rotation_2", 0x701d, I16, "turn"),
    p("loc_kp_2", 0x701e, F32, ""),
    p("spd_kp_2", 0x701f, F32, ""),
    p("spd_ki_2", 0x7020, F32, ""),
];

// ============================================================================
// 查找表
// ============================================================================

/// 参数查找表（按编码和按名称）
#[derive(Debug)]
pub struct ParameterRegistry {
    entries: &'static [ParameterDescriptor],
    by_code: HashMap<u16, &'static ParameterDescriptor>,
    by_name: HashMap<&'static str, &'static ParameterDescriptor>,
}

static REGISTRY: LazyLock<ParameterRegistry> =
    LazyLock::new(|| ParameterRegistry::from_table(PARAMETERS));

impl ParameterRegistry {
    /// 由静态表构建查找表
    pub fn from_table(entries: &'static [ParameterDescriptor]) -> Self {
        let by_code = entries.iter().map(|d| (d.code, d)).collect();
        let by_name = entries.iter().map(|d| (d.name, d)).collect();
        Self {
            entries,
            by_code,
            by_name,
        }
    }

    /// 全局参数表（首次访问时构建）
    pub fn global() -> &'static ParameterRegistry {
        &REGISTRY
    }

    pub fn by_code(&self, code: u16) -> Option<&'static ParameterDescriptor> {
        self.by_code.get(&code).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&'static ParameterDescriptor> {
        self.by_name.get(name).copied()
    }

    /// 按表内顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &'static ParameterDescriptor> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
