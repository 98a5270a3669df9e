// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Forwarding of validated readings to the ingestion endpoint
//!
//! The packet listener never talks HTTP itself. It hands each normalized
//! reading to a [`ForwardQueue`], a bounded channel drained by a single worker
//! task that performs the POST. When the queue is full the newest reading is
//! dropped and counted; the register bank still carries it until the next
//! update. A failed POST is logged and never retried.

pub mod client;
pub mod queue;

pub use client::Forwarder;
pub use queue::{spawn_worker, ForwardQueue, ForwardStats, ForwardStatsSnapshot};
