// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! Lifecycle of the bridge services. [`Daemon::launch`] loads the
//! verification key and binds both sockets before any task is spawned; a bad
//! configuration never leaves half the services running.
//!
//! ## Architecture
//!
//! Each service runs as an independent Tokio task sharing one `running` flag.
//! The listener and the Modbus supervisor poll the flag at least once per
//! second; the forwarding worker stops once every queue sender is gone, which
//! happens when the listener and its connection tasks have finished.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::error::BridgeError;
use crate::forwarder::{spawn_worker, ForwardStats, Forwarder};
use crate::frame::SignatureVerifier;
use crate::listener::{FramePipeline, ListenerStats, PacketListener};
use crate::modbus;
use crate::registers::RegisterBank;

/// Granularity at which long-running loops check the running flag
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Time between two heartbeat reports
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// How long `join` waits for each task before giving up on it
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a daemon task manager that coordinates the bridge services
///
/// # Fields
///
/// * `tasks` - Handles to running tasks for management and cleanup
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `bank` - Register bank written by the listener and read by the Modbus server
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    bank: RegisterBank,
    listener_addr: Option<SocketAddr>,
    modbus_addr: Option<SocketAddr>,
    listener_stats: Option<Arc<ListenerStats>>,
    forward_stats: Option<Arc<ForwardStats>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// The task list is empty and the running flag is set to `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sensor_bridge::daemon::Daemon;
    ///
    /// let daemon = Daemon::new();
    /// assert!(daemon.listener_addr().is_none());
    /// ```
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            bank: RegisterBank::new(),
            listener_addr: None,
            modbus_addr: None,
            listener_stats: None,
            forward_stats: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// # Errors
    ///
    /// A `BridgeError::Startup` when the public key cannot be loaded or a
    /// socket cannot be bound, or the forwarder construction error. No task is
    /// spawned in either case.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let verifier = SignatureVerifier::from_pem_file(&config.security.public_key)?;
        info!(
            "Loaded frame verification key from {:?} ({} byte signatures)",
            config.security.public_key,
            verifier.signature_len()
        );

        let modbus_listener = if config.modbus.enabled {
            let listener = TcpListener::bind((config.modbus.address.as_str(), config.modbus.port))
                .await
                .map_err(|e| {
                    BridgeError::Startup(format!(
                        "cannot bind Modbus server on {}:{}: {}",
                        config.modbus.address, config.modbus.port, e
                    ))
                })?;
            Some(listener)
        } else {
            info!("Modbus server disabled");
            None
        };

        let forwarder = if config.forwarder.enabled {
            Some(Forwarder::from_config(&config.forwarder)?)
        } else {
            info!("Forwarding disabled, readings only update the registers");
            None
        };

        let read_timeout = match config.listener.read_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let packet_listener = PacketListener::bind(
            &config.listener.address,
            config.listener.port,
            read_timeout,
        )
        .await?;

        let mut worker = None;
        let forward_queue = forwarder.map(|forwarder| {
            let (queue, task) = spawn_worker(forwarder, config.forwarder.queue_capacity);
            self.forward_stats = Some(queue.stats());
            worker = Some(task);
            queue
        });

        let pipeline = FramePipeline::new(
            Arc::new(verifier),
            self.bank.clone(),
            forward_queue,
            config.listener.strict_decode,
        );
        self.start_packet_listener(packet_listener, pipeline)?;

        if let Some(listener) = modbus_listener {
            self.start_modbus_server(listener)?;
        }

        // Joined after the listener, whose shutdown closes the queue
        if let Some(task) = worker {
            self.tasks.push(task);
        }

        // Start heartbeat task for monitoring
        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the sensor packet listener task
    fn start_packet_listener(
        &mut self,
        listener: PacketListener,
        pipeline: FramePipeline,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Starting sensor listener on {}", addr);
        self.listener_addr = Some(addr);
        self.listener_stats = Some(pipeline.stats());

        let running = self.running.clone();
        let task = tokio::spawn(async move { listener.run(pipeline, running).await });

        self.tasks.push(task);
        Ok(())
    }

    /// Launch the Modbus server task
    ///
    /// The server itself runs in an inner task; the outer task polls the
    /// running flag and aborts the server once it turns false.
    fn start_modbus_server(&mut self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Starting modbus server on {}", addr);
        self.modbus_addr = Some(addr);

        let running = self.running.clone();
        let bank = self.bank.clone();

        let task = tokio::spawn(async move {
            let server_handle = tokio::spawn(async move {
                if let Err(e) = modbus::serve(listener, bank).await {
                    error!("Modbus server error: {}", e);
                }
            });

            while running.load(Ordering::SeqCst) {
                time::sleep(POLL_INTERVAL).await;
            }

            info!("Shutting down Modbus server...");
            server_handle.abort();

            match time::timeout(JOIN_TIMEOUT, server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }

            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs bridge status periodically
    ///
    /// Every minute the listener and forwarding counters and the current
    /// register snapshot are logged at info level.
    fn start_heartbeat(&mut self) -> Result<()> {
        info!("Starting heartbeat monitor");

        let running = self.running.clone();
        let bank = self.bank.clone();
        let listener_stats = self.listener_stats.clone();
        let forward_stats = self.forward_stats.clone();

        let task = tokio::spawn(async move {
            let mut since_last = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                time::sleep(POLL_INTERVAL).await;
                since_last += POLL_INTERVAL;
                if since_last < HEARTBEAT_INTERVAL {
                    continue;
                }
                since_last = Duration::ZERO;

                if let Some(stats) = &listener_stats {
                    info!("Heartbeat: listener {:?}", stats.snapshot());
                }
                if let Some(stats) = &forward_stats {
                    info!("Heartbeat: forwarder {:?}", stats.snapshot());
                }
                info!("Heartbeat: registers {:?}", bank.read());
            }
            debug!("Heartbeat monitor stopped");
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Address the sensor listener is bound to, once launched
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener_addr
    }

    /// Address the Modbus server is bound to, if enabled and launched
    pub fn modbus_addr(&self) -> Option<SocketAddr> {
        self.modbus_addr
    }

    /// Shared register bank
    pub fn register_bank(&self) -> RegisterBank {
        self.bank.clone()
    }

    pub fn listener_stats(&self) -> Option<Arc<ListenerStats>> {
        self.listener_stats.clone()
    }

    pub fn forward_stats(&self) -> Option<Arc<ForwardStats>> {
        self.forward_stats.clone()
    }

    /// Stop all running tasks
    ///
    /// Only signals the tasks; call [`Daemon::join`] to wait for them.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete
    ///
    /// Each task gets up to five seconds. A panicked or failed task is logged
    /// and does not prevent waiting for the others.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => {
                    warn!("Task did not complete within timeout period, may be hung");
                }
            }
        }
        Ok(())
    }
}
