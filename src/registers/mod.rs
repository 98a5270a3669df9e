// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared register store
//!
//! ## Register Map
//!
//! | Register Address | Description | Scaling |
//! |-----------------|-------------|---------|
//! | 0 | Sensor id (low 16 bits) | 1 |
//! | 1 | Temperature, high word | ×100, truncated |
//! | 2 | Temperature, low word | ×100, truncated |
//! | 3 | Pressure, high word | ×100, truncated |
//! | 4 | Pressure, low word | ×100, truncated |
//! | 5 | Humidity, high word | ×100, truncated |
//! | 6 | Humidity, low word | ×100, truncated |
//! | 7 | Timestamp high word (of the low 32 bits) | epoch seconds |
//! | 8 | Timestamp low word | epoch seconds |
//!
//! Scaled values are signed 32-bit integers split into two's complement
//! halves, so a client recombines them with `((high << 16) | low) as i32`.

pub mod register_bank;

pub use register_bank::{pack_reading, RegisterBank, REGISTER_COUNT};
