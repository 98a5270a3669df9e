// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the sensor bridge
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `listener`: where sensors deliver signed frames
//! - `modbus`: the read-only Modbus TCP server
//! - `forwarder`: the ingestion endpoint and its queue
//! - `security`: the frame verification key
//!
//! ## Usage
//!
//! ```no_run
//! use sensor_bridge::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("0.0.0.0".to_string()),                    // Listener address
//!     Some(12345),                                    // Listener port
//!     Some(true),                                     // Enable Modbus
//!     Some("0.0.0.0".to_string()),                    // Modbus address
//!     Some(502),                                      // Modbus port
//!     Some("https://ingest.local/data".to_string()),  // Forward URL
//!     None,                                           // Public key path
//! );
//!
//! println!("Sensors connect to port {}", config.listener.port);
//! ```

pub mod forwarder;
pub mod listener;
pub mod modbus;
pub mod security;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use forwarder::ForwarderConfig;
pub use listener::ListenerConfig;
pub use modbus::ModbusConfig;
pub use security::SecurityConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure for the sensor bridge.
///
/// Every section falls back to its defaults when missing from the file, so
/// an empty YAML document is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Raw TCP listener receiving signed sensor frames.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Modbus TCP server exposing the register bank.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Forwarding of validated readings to the ingestion endpoint.
    #[serde(default)]
    pub forwarder: ForwarderConfig,

    /// Verification key used to authenticate frames.
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Config path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails schema
    /// validation, deserialization or the additional rule checks produces a
    /// `<name>.sample.yaml` next to it and an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // An empty document parses as null, treat it as an empty mapping
        let json_value = match serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })? {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value => value,
        };

        let schema: serde_json::Value =
            serde_json::from_str(utils::CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_json::from_value(json_value) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Run the rule checks that the JSON schema cannot express
    pub fn validate(&self) -> Result<()> {
        utils::validate_specific_rules(self)
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values explicitly provided override the existing configuration.
    ///
    /// # Parameters
    ///
    /// * `listen_address` - Network address for the sensor listener
    /// * `listen_port` - TCP port for the sensor listener
    /// * `modbus_enabled` - Optional flag to enable/disable the Modbus server
    /// * `modbus_address` - Optional network address for the Modbus server
    /// * `modbus_port` - Optional TCP port for the Modbus server
    /// * `forward_url` - Optional ingestion endpoint URL
    /// * `public_key` - Optional path to the frame verification key
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        listen_address: Option<String>,
        listen_port: Option<u16>,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        forward_url: Option<String>,
        public_key: Option<PathBuf>,
    ) {
        if let Some(address) = listen_address {
            debug!("Overriding listener address from command line: {}", address);
            self.listener.address = address;
        }
        if let Some(port) = listen_port {
            debug!("Overriding listener port from command line: {}", port);
            self.listener.port = port;
        }

        // Apply Modbus settings
        if let Some(enabled) = modbus_enabled {
            debug!("Overriding Modbus enabled from command line: {}", enabled);
            self.modbus.enabled = enabled;
        }
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }

        if let Some(url) = forward_url {
            debug!("Overriding forward URL from command line: {}", url);
            self.forwarder.url = url;
        }
        if let Some(key) = public_key {
            debug!("Overriding public key path from command line: {:?}", key);
            self.security.public_key = key;
        }
    }
}
