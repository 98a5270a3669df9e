// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Ingestion endpoint forwarding configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration of the HTTPS forwarder.
///
/// # Fields
///
/// * `enabled` - When false, readings only reach the Modbus registers
/// * `url` - Ingestion endpoint receiving one JSON POST per reading
/// * `ca_cert` - Optional PEM certificate trusted in addition to the system roots
/// * `timeout_secs` - Per-request timeout, 0 for none
/// * `queue_capacity` - Readings waiting for the worker before new ones are dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_url() -> String {
    "https://127.0.0.1:5000/data".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_url(),
            ca_cert: None,
            timeout_secs: default_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}
