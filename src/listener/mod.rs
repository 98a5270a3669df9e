// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor packet listener
//!
//! Sensors open a TCP connection, write one frame (22 byte payload followed by
//! its signature) and are disconnected. For every connection the listener:
//!
//! 1. accumulates bytes until the full frame length is reached, treating an
//!    early close or a read timeout as a framing error,
//! 2. verifies the signature over the payload,
//! 3. decodes the payload,
//! 4. updates the register bank,
//! 5. queues the normalized reading for forwarding,
//! 6. closes the connection.
//!
//! Any failure is logged and contained to its connection; the accept loop
//! keeps running.

pub mod packet_listener;

pub use packet_listener::{
    read_frame, FramePipeline, ListenerStats, ListenerStatsSnapshot, PacketListener,
};
