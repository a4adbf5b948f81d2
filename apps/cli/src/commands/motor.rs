//! 运行控制命令

use super::print_feedback;
use anyhow::{Context, Result};
use clap::Args;
use cybergear_driver::CyberGear;
use cybergear_protocol::{Baud, MotionCommand};

/// 运控指令参数（超限分量饱和到量程边界）
#[derive(Args, Debug, Clone)]
pub struct ControlArgs {
    #[arg(value_parser = crate::parse_u8)]
    pub node: u8,

    /// 前馈力矩 (Nm)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub torque: f32,

    /// 目标角度 (rad)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub position: f32,

    /// 目标角速度 (rad/s)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub velocity: f32,

    #[arg(long, default_value_t = 0.0)]
    pub kp: f32,

    #[arg(long, default_value_t = 0.0)]
    pub kd: f32,
}

impl ControlArgs {
    pub fn to_command(&self) -> MotionCommand {
        MotionCommand::new(self.torque, self.position, self.velocity, self.kp, self.kd)
    }
}

pub fn scan(motors: &CyberGear, start: u8, end: u8) -> Result<()> {
    let nodes = motors.scan_range(start..=end)?;
    if nodes.is_empty() {
        println!("No motors found in {}..={}", start, end);
    }
    for node in nodes {
        println!("{}", node);
    }
    Ok(())
}

pub fn uid(motors: &CyberGear, node: u8) -> Result<()> {
    let uid = motors.get_uid(node)?;
    println!("<{}> uid: 0x{:016X}", node, uid);
    Ok(())
}

pub fn control(motors: &CyberGear, args: &ControlArgs) -> Result<()> {
    print_feedback(&motors.control(args.node, args.to_command())?)
}

pub fn change_id(motors: &CyberGear, node: u8, new_node: u8) -> Result<()> {
    let uid = motors.change_id(node, new_node)?;
    println!("<{}> -> <{}> uid: 0x{:016X}", node, new_node, uid);
    Ok(())
}

/// 纯数字按选择值处理（1..=4 以外在发送前被拒绝），其余按名称解析
pub fn baud(motors: &CyberGear, node: u8, baud: &str) -> Result<()> {
    let uid = match baud.parse::<u8>() {
        Ok(selector) => motors.set_baud_selector(node, selector)?,
        Err(_) => {
            let baud: Baud = baud.parse().map_err(anyhow::Error::msg).context("Bad baud")?;
            motors.set_baud(node, baud)?
        },
    };
    println!("<{}> baud changed, uid: 0x{:016X}", node, uid);
    println!("Reconfigure the CAN interface to the new bit rate before continuing");
    Ok(())
}
