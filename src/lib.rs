// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signed sensor telemetry bridge
//!
//! Field sensors push RSA signed binary frames over raw TCP. Every frame that
//! passes signature verification is packed into nine Modbus holding registers
//! served read-only to SCADA clients. The same reading is forwarded as JSON to
//! an HTTPS ingestion endpoint.
//!
//! ## Modules
//!
//! - [`frame`]: wire format of the 22 byte payload and its RSA signature
//! - [`registers`]: the shared holding register bank
//! - [`listener`]: TCP reception and validation of frames
//! - [`modbus`]: read-only Modbus TCP server over the register bank
//! - [`forwarder`]: bounded queue and HTTPS client for the ingestion endpoint
//! - [`daemon`]: startup, supervision and shutdown of the services
//! - [`config`]: YAML configuration validated against a JSON schema

pub mod config;
pub mod daemon;
pub mod error;
pub mod forwarder;
pub mod frame;
pub mod listener;
pub mod modbus;
pub mod registers;

pub use error::{BridgeError, BridgeResult, ForwardError};
