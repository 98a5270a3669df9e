// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant};

use crate::error::{BridgeError, BridgeResult};
use crate::forwarder::ForwardQueue;
use crate::frame::{decode, encode_for_forward, SensorReading, SignatureVerifier, PAYLOAD_LEN};
use crate::registers::RegisterBank;

/// How often the accept loop wakes up to check the running flag
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-outcome frame counters
#[derive(Debug, Default)]
pub struct ListenerStats {
    accepted: AtomicU64,
    processed: AtomicU64,
    framing_errors: AtomicU64,
    signature_errors: AtomicU64,
    decode_errors: AtomicU64,
    io_errors: AtomicU64,
}

/// Point-in-time copy of [`ListenerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub accepted: u64,
    pub processed: u64,
    pub framing_errors: u64,
    pub signature_errors: u64,
    pub decode_errors: u64,
    pub io_errors: u64,
}

impl ListenerStats {
    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            signature_errors: self.signature_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }

    fn record_error(&self, err: &BridgeError) {
        let counter = match err {
            BridgeError::Framing { .. } => &self.framing_errors,
            BridgeError::Signature(_) => &self.signature_errors,
            BridgeError::Decode(_) => &self.decode_errors,
            _ => &self.io_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read exactly `frame_len` bytes, however the sender splits its writes
///
/// The peer closing early, or `timeout` elapsing before the frame is
/// complete, yields `BridgeError::Framing` with the number of bytes that did
/// arrive.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    frame_len: usize,
    timeout: Option<Duration>,
) -> BridgeResult<Vec<u8>> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut buf = vec![0u8; frame_len];
    let mut filled = 0;

    while filled < frame_len {
        let read = reader.read(&mut buf[filled..]);
        let n = match deadline {
            Some(deadline) => match time::timeout_at(deadline, read).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!("Frame read timed out after {} bytes", filled);
                    break;
                }
            },
            None => read.await?,
        };
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled < frame_len {
        return Err(BridgeError::Framing {
            received: filled,
            expected: frame_len,
        });
    }
    Ok(buf)
}

/// Validation and fan-out of a single frame
///
/// Cloned into every connection task. Clones share the register bank and the
/// forward queue.
#[derive(Debug, Clone)]
pub struct FramePipeline {
    verifier: Arc<SignatureVerifier>,
    bank: RegisterBank,
    forward_queue: Option<ForwardQueue>,
    strict_decode: bool,
    stats: Arc<ListenerStats>,
}

impl FramePipeline {
    pub fn new(
        verifier: Arc<SignatureVerifier>,
        bank: RegisterBank,
        forward_queue: Option<ForwardQueue>,
        strict_decode: bool,
    ) -> Self {
        Self {
            verifier,
            bank,
            forward_queue,
            strict_decode,
            stats: Arc::new(ListenerStats::default()),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.verifier.frame_len()
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Authenticate and apply one complete frame
    ///
    /// Nothing reaches the register bank or the forward queue unless the
    /// signature checks out. A reading that cannot be rendered for the
    /// ingestion endpoint still updates the registers.
    pub fn process(&self, frame: &[u8]) -> BridgeResult<SensorReading> {
        let frame_len = self.frame_len();
        if frame.len() < frame_len {
            return Err(BridgeError::Framing {
                received: frame.len(),
                expected: frame_len,
            });
        }

        let (payload, signature) = frame[..frame_len].split_at(PAYLOAD_LEN);
        self.verifier.verify(payload, signature)?;

        let reading = decode(payload)?;
        if self.strict_decode && !reading.is_finite() {
            return Err(BridgeError::Decode(format!(
                "non-finite value from sensor {}: {:?}",
                reading.sensor_id, reading
            )));
        }

        self.bank.update(&reading);

        if let Some(queue) = &self.forward_queue {
            match encode_for_forward(&reading) {
                Ok(forward) => {
                    if let Err(e) = queue.enqueue(forward) {
                        warn!("Reading from sensor {} not forwarded: {}", reading.sensor_id, e);
                    }
                }
                Err(e) => warn!(
                    "{} for sensor {}, registers updated but reading not forwarded: {}",
                    e.kind(),
                    reading.sensor_id,
                    e
                ),
            }
        }

        Ok(reading)
    }

    /// Serve one sensor connection: read a frame, process it, close
    pub async fn handle_connection(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        read_timeout: Option<Duration>,
    ) {
        self.stats.accepted.fetch_add(1, Ordering::Relaxed);

        let outcome = match read_frame(&mut stream, self.frame_len(), read_timeout).await {
            Ok(frame) => self.process(&frame),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reading) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Validated frame from {}: sensor {} at {}",
                    peer, reading.sensor_id, reading.timestamp
                );
            }
            Err(e) => {
                self.stats.record_error(&e);
                error!("{} from {}, frame dropped: {}", e.kind(), peer, e);
            }
        }

        if let Err(e) = stream.shutdown().await {
            debug!("Closing connection from {} failed: {}", peer, e);
        }
    }
}

/// Accept loop for sensor connections
pub struct PacketListener {
    listener: TcpListener,
    read_timeout: Option<Duration>,
}

impl PacketListener {
    /// Bind the listening socket
    ///
    /// ### Errors
    ///
    /// `BridgeError::Startup` when the address cannot be bound.
    pub async fn bind(
        address: &str,
        port: u16,
        read_timeout: Option<Duration>,
    ) -> BridgeResult<Self> {
        let listener = TcpListener::bind((address, port)).await.map_err(|e| {
            BridgeError::Startup(format!(
                "cannot bind sensor listener on {}:{}: {}",
                address, port, e
            ))
        })?;
        Ok(Self {
            listener,
            read_timeout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `running` turns false
    ///
    /// Each connection is handled in its own task so a slow sensor never
    /// delays the next one.
    pub async fn run(
        self,
        pipeline: FramePipeline,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        info!(
            "Sensor listener accepting frames of {} bytes on {}",
            pipeline.frame_len(),
            self.local_addr()?
        );

        while running.load(Ordering::SeqCst) {
            let accepted = match time::timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await
            {
                Ok(accepted) => accepted,
                Err(_) => continue,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!("Sensor connection from {}", peer);
                    let pipeline = pipeline.clone();
                    let read_timeout = self.read_timeout;
                    tokio::spawn(async move {
                        pipeline.handle_connection(stream, peer, read_timeout).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept sensor connection: {}", e);
                    time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        info!("Sensor listener stopped");
        Ok(())
    }
}
