// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};
use url::Url;

use super::Config;

/// JSON schema the YAML configuration is validated against
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./sensor_bridge --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Port Range**: listener and Modbus ports are within 1-65534
/// - **Port Clash**: the listener and an enabled Modbus server do not share an address and port
/// - **Forward URL**: parses and uses the `http` or `https` scheme; plain `http` only warns
/// - **CA certificate**: if configured, the file exists
/// - **IP Address Format**: unusual bind addresses are reported but not rejected
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    for (name, port) in [
        ("listener", config.listener.port),
        ("modbus", config.modbus.port),
    ] {
        if !(1..=65534).contains(&port) {
            anyhow::bail!("Invalid {} port number: {}", name, port);
        }
    }

    if config.modbus.enabled
        && config.modbus.port == config.listener.port
        && config.modbus.address == config.listener.address
    {
        anyhow::bail!(
            "Listener and Modbus server cannot both bind {}:{}",
            config.listener.address,
            config.listener.port
        );
    }

    for address in [&config.listener.address, &config.modbus.address] {
        if !is_valid_ip_address(address) {
            debug!("Potentially invalid address format: {}", address);
        }
    }

    if config.forwarder.enabled {
        let url = Url::parse(&config.forwarder.url)
            .with_context(|| format!("Invalid forwarder URL: {}", config.forwarder.url))?;
        match url.scheme() {
            "https" => {}
            "http" => warn!(
                "Forwarder URL {} is not encrypted, readings travel in clear text",
                url
            ),
            other => anyhow::bail!("Unsupported forwarder URL scheme: {}", other),
        }

        if let Some(ca_cert) = &config.forwarder.ca_cert {
            if !ca_cert.exists() {
                anyhow::bail!("Forwarder CA certificate not found at {:?}", ca_cert);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_port_clash_is_rejected() {
        let mut config = Config::default();
        config.modbus.port = config.listener.port;
        assert!(validate_specific_rules(&config).is_err());

        // No clash once Modbus is off
        config.modbus.enabled = false;
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_forward_url_scheme() {
        let mut config = Config::default();
        config.forwarder.url = "ftp://ingest.local/data".to_string();
        assert!(validate_specific_rules(&config).is_err());

        config.forwarder.url = "http://ingest.local/data".to_string();
        assert!(validate_specific_rules(&config).is_ok());

        config.forwarder.url = "not a url".to_string();
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_missing_ca_cert_is_rejected() {
        let mut config = Config::default();
        config.forwarder.ca_cert = Some(PathBuf::from("/nonexistent/cert.pem"));
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_is_valid_ip_address() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("sensor gateway"));
    }
}
