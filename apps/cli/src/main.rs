//! # CyberGear CLI
//!
//! CyberGear 电机命令行工具。每条命令独立执行：读取配置，打开总线，完成一次操作后退出。
//!
//! ```bash
//! # 配置默认接口
//! cybergear config set --interface can0
//!
//! # 扫描总线，读取参数
//! cybergear scan
//! cybergear get 1 limit_spd
//! cybergear run-mode 1 speed
//! cybergear set 1 spd_ref 3.0
//! ```

use anyhow::Result;
use clap::{Args, Parser};
use cybergear_driver::{CancelToken, CyberGear, CyberGearBuilder};
use std::time::Duration;
use tracing::{debug, warn};

mod commands;
mod config;

use commands::Commands;
use config::CliConfig;

/// CyberGear CLI - 电机命令行工具
#[derive(Parser, Debug)]
#[command(name = "cybergear")]
#[command(about = "Command-line interface for CyberGear actuators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    bus: BusArgs,

    #[command(subcommand)]
    command: Commands,
}

/// 总线参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct BusArgs {
    /// CAN 接口
    #[arg(short, long, global = true)]
    pub interface: Option<String>,

    /// 主机 ID
    #[arg(long, global = true, value_parser = parse_u8)]
    pub host_id: Option<u8>,

    /// 应答超时（毫秒）
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

impl BusArgs {
    /// 命令行参数优先，其次配置文件
    fn resolve(&self, config: &CliConfig) -> CliConfig {
        let mut resolved = config.clone();
        resolved.merge(self.interface.clone(), self.host_id, self.timeout_ms);
        resolved
    }

    /// 打开总线
    pub fn connect(&self, cancel: CancelToken) -> Result<CyberGear> {
        let config = self.resolve(&CliConfig::load()?);
        let mut builder = CyberGearBuilder::new().cancel_token(cancel);
        if let Some(interface) = &config.interface {
            builder = builder.interface(interface.as_str());
        }
        if let Some(host_id) = config.host_id {
            builder = builder.host_id(host_id);
        }
        if let Some(ms) = config.reply_timeout_ms {
            builder = builder.reply_timeout(Duration::from_millis(ms));
        }
        debug!("Connecting with {:?}", config);
        Ok(builder.build()?)
    }
}

/// 解析十进制或 `0x` 前缀的十六进制 u8
pub fn parse_u8(s: &str) -> Result<u8, String> {
    parse_int(s).and_then(|v| u8::try_from(v).map_err(|_| format!("{} out of range 0-255", s)))
}

/// 解析十进制或 `0x` 前缀的十六进制 u16
pub fn parse_u16(s: &str) -> Result<u16, String> {
    parse_int(s).and_then(|v| u16::try_from(v).map_err(|_| format!("{} out of range 0-65535", s)))
}

fn parse_int(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cybergear=info".parse()?)
                .add_directive("cybergear_driver=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Ctrl-C 结束当前事务
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        })?;
    }

    cli.command.execute(&cli.bus, cancel)
}
