// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor frame handling
//!
//! A frame is the fixed 22 byte little-endian payload sent by a field sensor,
//! immediately followed by an RSA signature over exactly those 22 bytes.
//!
//! ## Payload Layout
//!
//! | Offset | Size | Type | Field |
//! |--------|------|------|-------|
//! | 0 | 2 | i16 | sensor id |
//! | 2 | 8 | i64 | timestamp (UNIX epoch seconds) |
//! | 10 | 4 | f32 | temperature |
//! | 14 | 4 | f32 | pressure |
//! | 18 | 4 | f32 | humidity |
//!
//! For RSA-2048 keys the signature is 256 bytes, so a complete frame on the
//! wire is 278 bytes.

pub mod codec;
pub mod signature;

pub use codec::{decode, encode, encode_for_forward, ForwardReading, SensorReading, PAYLOAD_LEN};
pub use signature::{FrameSigner, SignatureVerifier};
