//! 配置管理
//!
//! 配置文件位于平台配置目录下的 `cybergear/config.toml`，命令行参数优先于文件。

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件路径
pub fn config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Cannot determine config directory")?;
    path.push("cybergear");
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认 CAN 接口
    pub interface: Option<String>,
    /// 主机 ID
    pub host_id: Option<u8>,
    /// 应答超时（毫秒）
    pub reply_timeout_ms: Option<u64>,
}

impl CliConfig {
    /// 从默认位置加载，文件不存在时返回默认配置
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// 用给出的值覆盖配置项
    pub fn merge(
        &mut self,
        interface: Option<String>,
        host_id: Option<u8>,
        reply_timeout_ms: Option<u64>,
    ) {
        if interface.is_some() {
            self.interface = interface;
        }
        if host_id.is_some() {
            self.host_id = host_id;
        }
        if reply_timeout_ms.is_some() {
            self.reply_timeout_ms = reply_timeout_ms;
        }
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// CAN 接口名称（如 can0）
        #[arg(short, long)]
        interface: Option<String>,

        /// 主机 ID
        #[arg(long, value_parser = crate::parse_u8)]
        host_id: Option<u8>,

        /// 应答超时（毫秒）
        #[arg(long)]
        reply_timeout_ms: Option<u64>,
    },

    /// 显示当前配置
    Show,

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        let path = config_file()?;
        match self {
            ConfigCommand::Set {
                interface,
                host_id,
                reply_timeout_ms,
            } => {
                let mut config = CliConfig::load_from(&path)?;
                config.merge(interface, host_id, reply_timeout_ms);
                config.save_to(&path)?;
                println!("Saved {}", path.display());
                Ok(())
            },
            ConfigCommand::Show => {
                let config = CliConfig::load_from(&path)?;
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            },
            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cybergear").join("config.toml");
        let config = CliConfig {
            interface: Some("vcan0".into()),
            host_id: Some(0xAA),
            reply_timeout_ms: Some(20),
        };
        config.save_to(&path).unwrap();
        assert_eq!(CliConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "interface = \"can1\"\n").unwrap();
        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.interface.as_deref(), Some("can1"));
        assert_eq!(config.host_id, None);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "host_id = 300\n").unwrap();
        assert!(CliConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut config = CliConfig {
            interface: Some("can0".into()),
            host_id: Some(0xFD),
            reply_timeout_ms: None,
        };
        config.merge(None, Some(0x10), Some(100));
        assert_eq!(config.interface.as_deref(), Some("can0"));
        assert_eq!(config.host_id, Some(0x10));
        assert_eq!(config.reply_timeout_ms, Some(100));
    }
}
