// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Lock protected bank of the 9 holding registers
//!
//! The bank is the only state shared between the packet listener (writer) and
//! the Modbus service (reader). Both sides work on whole `[u16; 9]` arrays
//! under one mutex, so a snapshot always comes from exactly one update.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::frame::SensorReading;

/// Number of holding registers exposed by the bridge
pub const REGISTER_COUNT: usize = 9;

/// Cheaply cloneable handle on the shared register array
#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    registers: Arc<Mutex<[u16; REGISTER_COUNT]>>,
}

impl RegisterBank {
    /// Create a bank with all registers at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all 9 registers with the packed form of `reading`
    ///
    /// Packing happens before the lock is taken; the write itself is a single
    /// array assignment under the lock.
    pub fn update(&self, reading: &SensorReading) {
        let packed = pack_reading(reading);
        *self.lock() = packed;
        debug!(
            "Register bank updated from sensor {}: {:?}",
            reading.sensor_id, packed
        );
    }

    /// Consistent copy of the registers
    pub fn read(&self) -> [u16; REGISTER_COUNT] {
        *self.lock()
    }

    // The array is plain data, a panic elsewhere cannot leave it half written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, [u16; REGISTER_COUNT]> {
        self.registers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Compute the register image of a reading
///
/// Measured values are scaled by 100 and truncated toward zero in `f32`
/// arithmetic; each register pair holds the low 32 bits of the scaled value.
/// NaN packs as 0. Only the low 32 bits of the timestamp are kept.
pub fn pack_reading(reading: &SensorReading) -> [u16; REGISTER_COUNT] {
    let (temp_high, temp_low) = split_words(scale(reading.temperature) as u32);
    let (pres_high, pres_low) = split_words(scale(reading.pressure) as u32);
    let (hum_high, hum_low) = split_words(scale(reading.humidity) as u32);
    // TODO: the epoch overflows 32 bits in 2106, widening needs two more registers
    let (ts_high, ts_low) = split_words((reading.timestamp & 0xFFFF_FFFF) as u32);

    [
        reading.sensor_id as u16,
        temp_high,
        temp_low,
        pres_high,
        pres_low,
        hum_high,
        hum_low,
        ts_high,
        ts_low,
    ]
}

fn scale(value: f32) -> i64 {
    (value * 100.0).trunc() as i64
}

fn split_words(value: u32) -> (u16, u16) {
    (((value >> 16) & 0xFFFF) as u16, (value & 0xFFFF) as u16)
}
