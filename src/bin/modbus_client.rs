// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::{timeout, Duration};
use tokio_modbus::prelude::*;

/// Modbus client reading the holding registers exposed by the sensor bridge
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Request timeout in seconds
    #[clap(long, default_value = "1")]
    timeout: u64,
}

/// Rebuild a signed 32 bit value from its high and low words
fn combine(high: u16, low: u16) -> i32 {
    ((u32::from(high) << 16) | u32::from(low)) as i32
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port)
        .parse()
        .with_context(|| format!("Invalid Modbus server address {}:{}", args.address, args.port))?;
    println!("Connecting to Modbus server at {}", socket_addr);

    let request_timeout = Duration::from_secs(args.timeout);
    let mut ctx = timeout(request_timeout, tcp::connect(socket_addr))
        .await
        .context("Timed out connecting to the Modbus server")??;

    let registers = timeout(request_timeout, ctx.read_holding_registers(0, 9))
        .await
        .context("Timed out reading holding registers")???;

    println!("Raw register values: {:?}", registers);

    let timestamp = combine(registers[7], registers[8]) as u32;
    let datetime = chrono::DateTime::from_timestamp(i64::from(timestamp), 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "invalid".to_string());

    println!("Register 0: Sensor ID = {}", registers[0] as i16);
    println!(
        "Registers 1-2: Temperature = {:.2} °C",
        combine(registers[1], registers[2]) as f64 / 100.0
    );
    println!(
        "Registers 3-4: Pressure = {:.2} hPa",
        combine(registers[3], registers[4]) as f64 / 100.0
    );
    println!(
        "Registers 5-6: Humidity = {:.2} %",
        combine(registers[5], registers[6]) as f64 / 100.0
    );
    println!("Registers 7-8: Timestamp = {} ({})", timestamp, datetime);

    ctx.disconnect().await?;
    Ok(())
}
