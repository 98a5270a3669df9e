// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error kinds of the bridge
//!
//! Every failure a frame can run into is represented here so the listener can
//! contain it at the frame boundary and the daemon can tell a fatal startup
//! problem from a dropped frame without looking at message strings.

use thiserror::Error;

/// Errors raised while bringing the bridge up or while processing a frame
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Key file missing or unparsable, or a socket could not be bound.
    /// Fatal, the process exits before serving.
    #[error("Startup failed: {0}")]
    Startup(String),

    /// The connection closed (or timed out) before a full frame arrived
    #[error("Incomplete frame: received {received} of {expected} bytes")]
    Framing { received: usize, expected: usize },

    /// The RSA PKCS#1 v1.5 / SHA-256 check over the payload failed
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// The payload decoded to values that cannot be represented downstream
    #[error("Implausible frame content: {0}")]
    Decode(String),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure modes of a single POST to the ingestion endpoint
#[derive(Error, Debug)]
pub enum ForwardError {
    /// The endpoint answered with something other than 200
    #[error("Ingestion endpoint answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// DNS, TCP, TLS or timeout failure
    #[error("Ingestion endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The forward queue is full and the reading was discarded
    #[error("Forward queue full, reading for sensor {sensor_id} dropped")]
    QueueFull { sensor_id: i16 },

    /// The forwarding worker is gone
    #[error("Forward queue closed")]
    QueueClosed,
}

impl BridgeError {
    /// Short label used in log lines and counters
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Startup(_) => "StartupError",
            BridgeError::Framing { .. } => "FramingError",
            BridgeError::Signature(_) => "SignatureError",
            BridgeError::Decode(_) => "DecodeError",
            BridgeError::Forward(_) => "ForwardError",
            BridgeError::Io(_) => "IoError",
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
