//! 总线定点值与物理量换算
//!
//! 运控帧与反馈帧中的物理量都以 16 位无符号整数线性映射到固定区间：
//!
//! - 编码：`round((clamp(x, min, max) - min) * 65535 / (max - min))`
//! - 解码：`u / 65535 * (max - min) + min`
//!
//! 超出区间的指令值被静默饱和到最近的边界（执行器安全要求），不产生错误。

use std::f32::consts::PI;

/// 16 位总线值的满量程
pub const BUS_FULL_SCALE: u16 = u16::MAX;

/// 物理量区间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// 一个总线单位对应的物理量
    pub fn quantum(&self) -> f32 {
        (self.max - self.min) / BUS_FULL_SCALE as f32
    }

    /// 物理量 → 总线值
    pub fn to_bus(&self, x: f32) -> u16 {
        to_bus_units(x, self.min, self.max)
    }

    /// 总线值 → 物理量
    pub fn to_engineering(&self, u: u16) -> f32 {
        to_engineering_units(u, self.min, self.max)
    }
}

/// 位置：-4π ~ 4π rad
pub const POSITION: Range = Range::new(-4.0 * PI, 4.0 * PI);
/// 速度：-30 ~ 30 rad/s
pub const VELOCITY: Range = Range::new(-30.0, 30.0);
/// 力矩：-12 ~ 12 N·m
pub const TORQUE: Range = Range::new(-12.0, 12.0);
/// 位置增益 Kp：0 ~ 500
pub const KP: Range = Range::new(0.0, 500.0);
/// 速度增益 Kd：0 ~ 5
pub const KD: Range = Range::new(0.0, 5.0);
/// 温度：0 ~ 6553.5（单位 0.1 ℃ 对应总线值 1）
pub const TEMPERATURE: Range = Range::new(0.0, 6553.5);

/// 物理量转换为 16 位总线值（饱和，四舍五入）
pub fn to_bus_units(x: f32, min: f32, max: f32) -> u16 {
    let span = max as f64 - min as f64;
    if !(span > 0.0) {
        return 0;
    }
    let x = (x as f64).clamp(min as f64, max as f64);
    // NaN 经 clamp 仍为 NaN，`as` 转换会饱和为 0
    ((x - min as f64) * BUS_FULL_SCALE as f64 / span).round() as u16
}

/// 16 位总线值转换为物理量
pub fn to_engineering_units(u: u16, min: f32, max: f32) -> f32 {
    let span = max as f64 - min as f64;
    (u as f64 / BUS_FULL_SCALE as f64 * span + min as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_bus_units_boundaries() {
        assert_eq!(to_bus_units(-12.0, -12.0, 12.0), 0);
        assert_eq!(to_bus_units(12.0, -12.0, 12.0), 65535);
        // 中点：32767.5 四舍五入
        assert_eq!(to_bus_units(0.0, -12.0, 12.0), 32768);
    }

    #[test]
    fn test_to_bus_units_clamps() {
        assert_eq!(to_bus_units(100.0, -30.0, 30.0), 65535);
        assert_eq!(to_bus_units(-100.0, -30.0, 30.0), 0);
        assert_eq!(VELOCITY.to_bus(f32::INFINITY), 65535);
        assert_eq!(VELOCITY.to_bus(f32::NEG_INFINITY), 0);
    }

    #[test]
    fn test_to_bus_units_degenerate_range() {
        assert_eq!(to_bus_units(1.0, 5.0, 5.0), 0);
        assert_eq!(to_bus_units(1.0, 5.0, -5.0), 0);
    }

    #[test]
    fn test_to_engineering_units_boundaries() {
        assert!((to_engineering_units(0, -30.0, 30.0) + 30.0).abs() < 1e-6);
        assert!((to_engineering_units(65535, -30.0, 30.0) - 30.0).abs() < 1e-6);
        assert!((TEMPERATURE.to_engineering(250) - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_quantum() {
        assert!((TORQUE.quantum() - 24.0 / 65535.0).abs() < 1e-9);
    }

    proptest! {
        /// 区间内的值往返误差不超过一个总线量化单位
        #[test]
        fn roundtrip_within_one_quantum(x in -4.0f32 * PI..=4.0f32 * PI) {
            let back = POSITION.to_engineering(POSITION.to_bus(x));
            prop_assert!((back - x).abs() <= POSITION.quantum());
        }

        #[test]
        fn roundtrip_kd_within_one_quantum(x in 0.0f32..=5.0f32) {
            let back = KD.to_engineering(KD.to_bus(x));
            prop_assert!((back - x).abs() <= KD.quantum());
        }

        /// 区间外的值先饱和到边界
        #[test]
        fn out_of_range_clamps(x in 30.0f32..1.0e6f32) {
            prop_assert_eq!(VELOCITY.to_bus(x), 65535);
            prop_assert_eq!(VELOCITY.to_bus(-x), 0);
        }
    }
}
