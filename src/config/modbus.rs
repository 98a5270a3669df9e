// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register server configuration
//!
//! The bridge republishes the last validated sensor reading as nine holding
//! registers. SCADA pollers read them with function code 3; no write is ever
//! accepted, so this section only says where the server listens and whether
//! it runs at all.

use serde::{Deserialize, Serialize};

/// Where the read-only holding register server listens.
///
/// Every field may be omitted from the YAML file. A missing section or field
/// takes the value from [`ModbusConfig::default`], which serves on
/// `127.0.0.1:5020` next to the sensor listener on port 12345.
///
/// # Example
///
/// ```
/// use sensor_bridge::config::ModbusConfig;
///
/// let plant_network = ModbusConfig {
///     address: "0.0.0.0".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(plant_network.port, 5020);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Serve the register bank to pollers.
    ///
    /// Switching it off does not stop register updates; frames are still
    /// verified and stored, they just cannot be read over Modbus.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Port pollers connect to. Must differ from `listener.port`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface the register server binds to. Pollers on the plant network
    /// usually need "0.0.0.0".
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    5020
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            address: default_address(),
        }
    }
}
