// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module provides the Modbus TCP server that lets a SCADA poller read
//! the latest validated sensor reading as holding registers.
//!
//! ## Key Components
//!
//! - `BridgeModbusService`: the per-connection service answering function
//!   code 0x03 from a register bank snapshot.
//! - `serve`: the long-lived accept loop, started by the daemon.
//!
//! See [`crate::registers`] for the register map.

pub mod modbus_server;
pub use modbus_server::{serve, BridgeModbusService};
