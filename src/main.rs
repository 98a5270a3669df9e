// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the signed sensor telemetry bridge

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tokio::signal;

use sensor_bridge::config::{self, Config};
use sensor_bridge::daemon::Daemon;
use sensor_bridge::BridgeError;

/// Bridge from signed sensor frames to Modbus TCP and an HTTPS ingestion endpoint
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Address the sensor listener binds to
    #[arg(long)]
    listen_address: Option<String>,

    /// Port sensors connect to
    #[arg(long)]
    listen_port: Option<u16>,

    /// Modbus enabled
    #[arg(long)]
    modbus_enabled: Option<bool>,

    /// Modbus server address
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus server port
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Ingestion endpoint validated readings are posted to
    #[arg(long)]
    forward_url: Option<String>,

    /// PEM public key used to verify frame signatures
    #[arg(long)]
    public_key: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger with appropriate level based on verbose and quiet flags
    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(
        args.listen_address,
        args.listen_port,
        args.modbus_enabled,
        args.modbus_address,
        args.modbus_port,
        args.forward_url,
        args.public_key,
    );
    config.validate()?;

    info!("Starting sensor bridge");
    let mut daemon = Daemon::new();
    if let Err(err) = daemon.launch(&config).await {
        match err.downcast_ref::<BridgeError>() {
            Some(bridge_err) => error!("{}: {}", bridge_err.kind(), bridge_err),
            None => error!("StartupError: {:#}", err),
        }
        return Err(err);
    }

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, terminating daemon"),
        Err(err) => error!("Error waiting for shutdown signal: {}", err),
    }

    daemon.shutdown();
    daemon.join().await?;
    info!("Sensor bridge stopped");

    Ok(())
}
