// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor packet listener configuration

use serde::{Deserialize, Serialize};

/// Configuration for the raw TCP listener receiving signed sensor frames.
///
/// # Example
///
/// ```
/// use sensor_bridge::config::ListenerConfig;
///
/// let listener_config = ListenerConfig {
///     address: "0.0.0.0".to_string(),
///     port: 12345,
///     read_timeout_secs: 5,
///     strict_decode: true,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// The network address the listener binds to. Default is "127.0.0.1".
    #[serde(default = "default_address")]
    pub address: String,

    /// The TCP port sensors connect to. Default is 12345.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum time, in seconds, a sensor connection may take to deliver its
    /// complete frame. A slower connection is dropped as an incomplete frame.
    /// 0 disables the limit.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Reject frames whose temperature, pressure or humidity is NaN or
    /// infinite instead of passing them through to the registers.
    #[serde(default)]
    pub strict_decode: bool,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_read_timeout_secs() -> u64 {
    10
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            read_timeout_secs: default_read_timeout_secs(),
            strict_decode: false,
        }
    }
}
