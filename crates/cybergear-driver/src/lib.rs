//! # CyberGear Driver
//!
//! CyberGear 电机的事务层与设备接口
//!
//! 总线上的每次交互都是一次事务：发送一帧请求，在截止时间内等待匹配的应答。
//! 事务之间由总线锁串行化，等待期间收到的告警帧进入告警队列。
//!
//! # Example
//!
//! ```no_run
//! use cybergear_driver::CyberGearBuilder;
//! use cybergear_protocol::RunMode;
//!
//! let motors = CyberGearBuilder::new().interface("can0").build()?;
//! let feedback = motors.set_run_mode(1, RunMode::Speed)?;
//! println!("position: {:.3} rad", feedback.position);
//! let (_, value) = motors.read_param(1, "limit_spd")?;
//! println!("limit_spd = {}", value);
//! # Ok::<(), cybergear_driver::DriverError>(())
//! ```

pub mod alarm;
mod builder;
pub mod bus;
mod config;
mod device;
mod error;
pub mod metrics;
pub mod reassembly;
pub mod transaction;

pub use alarm::{AlarmEvent, AlarmQueue};
pub use builder::{CyberGearBuilder, DEFAULT_INTERFACE};
pub use bus::{Bus, BusSession, CancelToken};
pub use config::TransactionConfig;
pub use device::{CyberGear, ParamKey, resolve_param};
pub use error::DriverError;
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use reassembly::RawConfigDump;
pub use transaction::{Exchange, ReplyFilter, TransactionState};
