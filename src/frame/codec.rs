// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fixed-offset codec for the 22 byte sensor payload
//!
//! `decode` and `encode` are exact inverses. `encode_for_forward` produces the
//! normalized JSON shape expected by the ingestion endpoint; it is purely a
//! presentation transform and does not range-check values.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Size of the signed payload in bytes
pub const PAYLOAD_LEN: usize = 22;

const ID_OFFSET: usize = 0;
const TIMESTAMP_OFFSET: usize = 2;
const TEMPERATURE_OFFSET: usize = 10;
const PRESSURE_OFFSET: usize = 14;
const HUMIDITY_OFFSET: usize = 18;

/// One decoded sensor measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: i16,
    /// UNIX epoch seconds as sent by the sensor
    pub timestamp: i64,
    pub temperature: f32,
    pub pressure: f32,
    pub humidity: f32,
}

impl SensorReading {
    /// `true` when all three measured values are finite numbers
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.pressure.is_finite() && self.humidity.is_finite()
    }
}

/// Reading in the shape posted to the ingestion endpoint
///
/// Field order matters for readers of the raw body, serde keeps declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardReading {
    pub sensor_id: i16,
    /// ISO-8601, UTC, second resolution (`2023-11-14T22:13:20`)
    pub timestamp: String,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Decode a payload into a [`SensorReading`]
///
/// Only the first [`PAYLOAD_LEN`] bytes are looked at.
///
/// ### Errors
///
/// Returns `BridgeError::Framing` if fewer than 22 bytes are supplied.
pub fn decode(bytes: &[u8]) -> BridgeResult<SensorReading> {
    if bytes.len() < PAYLOAD_LEN {
        return Err(BridgeError::Framing {
            received: bytes.len(),
            expected: PAYLOAD_LEN,
        });
    }

    Ok(SensorReading {
        sensor_id: i16::from_le_bytes(field(bytes, ID_OFFSET)),
        timestamp: i64::from_le_bytes(field(bytes, TIMESTAMP_OFFSET)),
        temperature: f32::from_le_bytes(field(bytes, TEMPERATURE_OFFSET)),
        pressure: f32::from_le_bytes(field(bytes, PRESSURE_OFFSET)),
        humidity: f32::from_le_bytes(field(bytes, HUMIDITY_OFFSET)),
    })
}

/// Pack a reading into the wire payload, as a sensor does before signing
pub fn encode(reading: &SensorReading) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[ID_OFFSET..TIMESTAMP_OFFSET].copy_from_slice(&reading.sensor_id.to_le_bytes());
    payload[TIMESTAMP_OFFSET..TEMPERATURE_OFFSET]
        .copy_from_slice(&reading.timestamp.to_le_bytes());
    payload[TEMPERATURE_OFFSET..PRESSURE_OFFSET]
        .copy_from_slice(&reading.temperature.to_le_bytes());
    payload[PRESSURE_OFFSET..HUMIDITY_OFFSET].copy_from_slice(&reading.pressure.to_le_bytes());
    payload[HUMIDITY_OFFSET..PAYLOAD_LEN].copy_from_slice(&reading.humidity.to_le_bytes());
    payload
}

/// Build the normalized forward representation of a reading
///
/// Floating values are rounded to 2 decimal places and the timestamp is
/// rendered as an ISO-8601 UTC date-time without offset.
///
/// ### Errors
///
/// Returns `BridgeError::Decode` when a measured value is NaN or infinite,
/// since JSON has no number for it, or when the timestamp lies outside the
/// range a calendar date can represent.
pub fn encode_for_forward(reading: &SensorReading) -> BridgeResult<ForwardReading> {
    if !reading.is_finite() {
        return Err(BridgeError::Decode(format!(
            "non-finite value from sensor {} cannot be sent as JSON: {:?}",
            reading.sensor_id, reading
        )));
    }

    let timestamp = DateTime::from_timestamp(reading.timestamp, 0).ok_or_else(|| {
        BridgeError::Decode(format!(
            "timestamp {} cannot be rendered as a date",
            reading.timestamp
        ))
    })?;

    Ok(ForwardReading {
        sensor_id: reading.sensor_id,
        timestamp: timestamp.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string(),
        temperature: round_2dp(reading.temperature),
        pressure: round_2dp(reading.pressure),
        humidity: round_2dp(reading.humidity),
    })
}

fn round_2dp(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
