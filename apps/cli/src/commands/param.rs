//! 参数读写命令

use anyhow::Result;
use cybergear_driver::{CyberGear, ParamKey};
use cybergear_protocol::{ParamValue, ParameterDescriptor};
use serde_json::json;

/// `0x` 前缀或纯数字按编码解析，其余按名称
pub fn parse_key(key: &str) -> Result<ParamKey<'_>> {
    let numeric = key.starts_with("0x")
        || key.starts_with("0X")
        || key.chars().all(|c| c.is_ascii_digit());
    if numeric {
        let code = crate::parse_u16(key).map_err(anyhow::Error::msg)?;
        Ok(ParamKey::Code(code))
    } else {
        Ok(ParamKey::Name(key))
    }
}

fn format_value(descriptor: &ParameterDescriptor, value: &ParamValue) -> String {
    match value {
        ParamValue::U8(v) => format!("0x{:02X}{}", v, descriptor.unit),
        ParamValue::F32(v) => format!("{:.3}{}", v, descriptor.unit),
        other => format!("{}{}", other, descriptor.unit),
    }
}

fn print_entry(descriptor: &ParameterDescriptor, value: &ParamValue) {
    println!(
        "0x{:04X} {:15}: {}",
        descriptor.code,
        descriptor.name,
        format_value(descriptor, value)
    );
}

pub fn get(motors: &CyberGear, node: u8, key: &str) -> Result<()> {
    let (descriptor, value) = motors.read_param(node, parse_key(key)?)?;
    print_entry(descriptor, &value);
    Ok(())
}

pub fn set(motors: &CyberGear, node: u8, key: &str, value: f64) -> Result<()> {
    let feedback = motors.set_param(node, parse_key(key)?, value)?;
    println!("<{}> {} <- {}", node, key, value);
    super::print_feedback(&feedback)
}

fn entry_json(descriptor: &ParameterDescriptor, value: &ParamValue) -> serde_json::Value {
    let value = match value {
        ParamValue::Str(s) => json!(s),
        other => json!(other.as_f64()),
    };
    json!({
        "code": format!("0x{:04X}", descriptor.code),
        "name": descriptor.name,
        "type": format!("{:?}", descriptor.wire_type),
        "unit": descriptor.unit,
        "value": value,
    })
}

pub fn dump(motors: &CyberGear, node: u8, as_json: bool) -> Result<()> {
    let results = motors.dump(node)?;
    if as_json {
        let entries: Vec<_> = results
            .iter()
            .map(|(descriptor, result)| match result {
                Ok(value) => entry_json(descriptor, value),
                Err(e) => json!({
                    "code": format!("0x{:04X}", descriptor.code),
                    "name": descriptor.name,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (descriptor, result) in &results {
        match result {
            Ok(value) => print_entry(descriptor, value),
            Err(e) => eprintln!("0x{:04X} {:15}: {}", descriptor.code, descriptor.name, e),
        }
    }
    Ok(())
}

pub fn raw_dump(motors: &CyberGear, node: u8) -> Result<()> {
    let dump = motors.read_raw_config(node)?;
    for (i, line) in dump.bytes.chunks(16).enumerate() {
        println!("{:04X}: {}", i * 16, hex::encode_upper(line));
    }
    if !dump.complete {
        eprintln!("warning: end marker not received, dump may be truncated");
    }
    Ok(())
}
