// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{self, Duration};

use sensor_bridge::frame::{FrameSigner, SensorReading};

/// Simulated field sensor sending signed readings to the bridge
///
/// Every interval a reading with random values in plausible ranges is
/// encoded, signed with the sensor private key and delivered over a fresh
/// TCP connection.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Bridge listener address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Bridge listener port
    #[clap(long, default_value = "12345")]
    port: u16,

    /// Private key used to sign frames (PKCS#8 or PKCS#1 PEM)
    #[clap(long, default_value = "./private.pem")]
    private_key: PathBuf,

    /// Sensor identifier
    #[clap(long, default_value = "101")]
    sensor_id: i16,

    /// Seconds between two readings
    #[clap(long, default_value = "5")]
    interval: u64,

    /// Number of readings to send, 0 sends forever
    #[clap(long, default_value = "0")]
    count: u64,
}

fn random_reading(sensor_id: i16) -> SensorReading {
    let mut rng = rand::rng();
    SensorReading {
        sensor_id,
        timestamp: chrono::Utc::now().timestamp(),
        temperature: rng.random_range(20.0..25.0),
        pressure: rng.random_range(1010.0..1015.0),
        humidity: rng.random_range(40.0..60.0),
    }
}

async fn send_frame(target: &str, frame: &[u8]) -> Result<()> {
    let mut stream = TcpStream::connect(target)
        .await
        .with_context(|| format!("Failed to connect to bridge at {}", target))?;
    stream
        .write_all(frame)
        .await
        .context("Failed to write frame")?;
    stream.shutdown().await.context("Failed to close connection")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let signer = FrameSigner::from_pem_file(&args.private_key)?;
    let target = format!("{}:{}", args.address, args.port);

    let mut ticker = time::interval(Duration::from_secs(args.interval.max(1)));
    let mut sent = 0u64;
    while args.count == 0 || sent < args.count {
        ticker.tick().await;

        let reading = random_reading(args.sensor_id);
        let frame = signer.build_frame(&reading);
        match send_frame(&target, &frame).await {
            Ok(()) => info!(
                "Sent {} byte frame: temperature {:.2}, pressure {:.2}, humidity {:.2}",
                frame.len(),
                reading.temperature,
                reading.pressure,
                reading.humidity
            ),
            Err(e) => error!("{:#}", e),
        }
        sent += 1;
    }

    Ok(())
}
