//! 命令定义和实现

pub mod motor;
pub mod param;

use crate::BusArgs;
use crate::config::ConfigCommand;
use anyhow::Result;
use clap::Subcommand;
use cybergear_driver::{CancelToken, CyberGear};
use cybergear_protocol::{Feedback, MAX_NODE_ID};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 扫描总线上的电机
    Scan {
        /// 起始节点
        #[arg(long, default_value_t = 0, value_parser = crate::parse_u8)]
        start: u8,
        /// 结束节点（含）
        #[arg(long, default_value_t = MAX_NODE_ID, value_parser = crate::parse_u8)]
        end: u8,
    },

    /// 读取 64 位设备 ID
    Uid {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
    },

    /// 使能
    Enable {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
    },

    /// 停止
    Disable {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        /// 同时清除故障
        #[arg(long)]
        clear_fault: bool,
    },

    /// 把当前位置设为机械零位
    Zero {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
    },

    /// 读取一帧反馈
    Feedback {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
    },

    /// 运控指令
    Control {
        #[command(flatten)]
        args: motor::ControlArgs,
    },

    /// 修改节点 ID
    ChangeId {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        #[arg(value_parser = crate::parse_u8)]
        new_node: u8,
    },

    /// 修改 CAN 波特率（1m|500k|250k|125k 或选择值 1-4）
    Baud {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        baud: String,
    },

    /// 切换运行模式（operation|position|speed|current）
    RunMode {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        mode: cybergear_protocol::RunMode,
    },

    /// 读取参数（名称或 0x 编码）
    Get {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        key: String,
    },

    /// 写入数值参数
    Set {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        key: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// 读取参数表中的全部参数
    Dump {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 读取原始配置区
    RawDump {
        #[arg(value_parser = crate::parse_u8)]
        node: u8,
    },
}

impl Commands {
    pub fn execute(self, bus: &BusArgs, cancel: CancelToken) -> Result<()> {
        if let Commands::Config(cmd) = self {
            return cmd.execute();
        }

        let motors = bus.connect(cancel)?;
        let result = self.run(&motors);
        report_alarms(&motors);
        result
    }

    fn run(self, motors: &CyberGear) -> Result<()> {
        match self {
            Commands::Config(_) => Ok(()),
            Commands::Scan { start, end } => motor::scan(motors, start, end),
            Commands::Uid { node } => motor::uid(motors, node),
            Commands::Enable { node } => print_feedback(&motors.enable(node)?),
            Commands::Disable { node, clear_fault } => {
                print_feedback(&motors.disable(node, clear_fault)?)
            },
            Commands::Zero { node } => print_feedback(&motors.set_zero(node)?),
            Commands::Feedback { node } => print_feedback(&motors.feedback(node)?),
            Commands::Control { args } => motor::control(motors, &args),
            Commands::ChangeId { node, new_node } => motor::change_id(motors, node, new_node),
            Commands::Baud { node, baud } => motor::baud(motors, node, &baud),
            Commands::RunMode { node, mode } => {
                print_feedback(&motors.set_run_mode(node, mode)?)
            },
            Commands::Get { node, key } => param::get(motors, node, &key),
            Commands::Set { node, key, value } => param::set(motors, node, &key, value),
            Commands::Dump { node, json } => param::dump(motors, node, json),
            Commands::RawDump { node } => param::raw_dump(motors, node),
        }
    }
}

/// 打印本次运行期间收到的告警
fn report_alarms(motors: &CyberGear) {
    for alarm in motors.alarms() {
        eprintln!(
            "alarm: node {} fault word 0x{:016X} at {:.3}",
            alarm.node, alarm.fault_word, alarm.timestamp
        );
    }
}

pub fn print_feedback(feedback: &Feedback) -> Result<()> {
    let status = feedback.status;
    println!(
        "<{}> mode:{:?} pos:{:>8.3} rad  vel:{:>8.3} rad/s  torque:{:>7.3} Nm  temp:{:>5.1} degC",
        feedback.node,
        status.motor_mode(),
        feedback.position,
        feedback.velocity,
        feedback.torque,
        feedback.temperature
    );
    if status.has_fault() {
        println!("<{}> fault flags: 0x{:02X}", feedback.node, feedback.fault_flags);
    }
    Ok(())
}
