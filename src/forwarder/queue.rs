// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Bounded hand-off between the packet listener and the forwarding worker

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::Forwarder;
use crate::error::ForwardError;
use crate::frame::ForwardReading;

/// Counters describing what happened to queued readings
#[derive(Debug, Default)]
pub struct ForwardStats {
    forwarded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ForwardStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStatsSnapshot {
    /// Readings the endpoint acknowledged with 200
    pub forwarded: u64,
    /// Readings lost to a non-200 answer or a transport failure
    pub failed: u64,
    /// Readings discarded because the queue was full
    pub dropped: u64,
}

impl ForwardStats {
    pub fn snapshot(&self) -> ForwardStatsSnapshot {
        ForwardStatsSnapshot {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the forward queue
///
/// Cloned into every connection task. Enqueueing never waits: when the queue
/// is full the reading being offered is the one discarded.
#[derive(Debug, Clone)]
pub struct ForwardQueue {
    sender: mpsc::Sender<ForwardReading>,
    stats: Arc<ForwardStats>,
}

impl ForwardQueue {
    /// Create a queue of `capacity` readings and its receiving end
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ForwardReading>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                stats: Arc::new(ForwardStats::default()),
            },
            receiver,
        )
    }

    /// Offer a reading to the worker without blocking
    ///
    /// ### Errors
    ///
    /// * `ForwardError::QueueFull` when the reading was dropped
    /// * `ForwardError::QueueClosed` when the worker has stopped
    pub fn enqueue(&self, reading: ForwardReading) -> Result<(), ForwardError> {
        match self.sender.try_send(reading) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(reading)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(ForwardError::QueueFull {
                    sensor_id: reading.sensor_id,
                })
            }
            Err(TrySendError::Closed(_)) => Err(ForwardError::QueueClosed),
        }
    }

    pub fn stats(&self) -> Arc<ForwardStats> {
        Arc::clone(&self.stats)
    }
}

/// Start the forwarding worker
///
/// The worker drains the queue one reading at a time and exits once every
/// [`ForwardQueue`] clone has been dropped and the queue is empty.
pub fn spawn_worker(
    forwarder: Forwarder,
    capacity: usize,
) -> (ForwardQueue, JoinHandle<Result<()>>) {
    let (queue, mut receiver) = ForwardQueue::bounded(capacity);
    let stats = queue.stats();

    info!(
        "Starting forwarding worker to {} (queue capacity {})",
        forwarder.url(),
        capacity.max(1)
    );

    let task = tokio::spawn(async move {
        while let Some(reading) = receiver.recv().await {
            debug!("Forwarding reading {:?}", reading);
            match forwarder.send(&reading).await {
                Ok(()) => {
                    stats.forwarded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "ForwardError for sensor {} at {}: {}",
                        reading.sensor_id, reading.timestamp, e
                    );
                }
            }
        }
        warn!("Forward queue closed, forwarding worker stopping");
        Ok(())
    });

    (queue, task)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(sensor_id: i16) -> ForwardReading {
        ForwardReading {
            sensor_id,
            timestamp: "2023-11-14T22:13:20".to_string(),
            temperature: 23.45,
            pressure: 1013.2,
            humidity: 55.1,
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (queue, mut receiver) = ForwardQueue::bounded(2);

        queue.enqueue(reading(1)).unwrap();
        queue.enqueue(reading(2)).unwrap();
        let err = queue.enqueue(reading(3)).unwrap_err();
        assert!(matches!(err, ForwardError::QueueFull { sensor_id: 3 }));
        assert_eq!(queue.stats().snapshot().dropped, 1);

        assert_eq!(receiver.recv().await.unwrap().sensor_id, 1);
        assert_eq!(receiver.recv().await.unwrap().sensor_id, 2);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_is_reported() {
        let (queue, receiver) = ForwardQueue::bounded(4);
        drop(receiver);
        assert!(matches!(
            queue.enqueue(reading(1)),
            Err(ForwardError::QueueClosed)
        ));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (queue, _receiver) = ForwardQueue::bounded(0);
        assert!(queue.enqueue(reading(1)).is_ok());
    }
}
