// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End to end tests of the bridge daemon
//!
//! A daemon is launched on ephemeral ports with the fixture key pair and a
//! mocked ingestion endpoint; frames are delivered over raw TCP and the
//! outcome is observed through the register bank, a Modbus client and the
//! requests the mock received.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tokio_modbus::prelude::*;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sensor_bridge::config::Config;
use sensor_bridge::daemon::Daemon;
use sensor_bridge::frame::{FrameSigner, SensorReading};
use sensor_bridge::BridgeError;

const SCENARIO_FRAME: &[u8] = include_bytes!("fixtures/scenario_frame.bin");
const SCENARIO_REGISTERS: [u16; 9] = [101, 0, 2345, 1, 35784, 0, 5510, 25939, 61696];

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn test_config(forward_url: Option<String>) -> Config {
    let mut config = Config::default();
    config.listener.port = 0;
    config.listener.read_timeout_secs = 2;
    config.modbus.port = 0;
    config.security.public_key = fixture("public.pem");
    match forward_url {
        Some(url) => config.forwarder.url = url,
        None => config.forwarder.enabled = false,
    }
    config
}

async fn mock_ingestion(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// Write `bytes` as one sensor connection and wait for the bridge to close it
async fn deliver(addr: SocketAddr, bytes: &[u8]) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(bytes).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut rest = Vec::new();
    time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("bridge did not close the connection")
        .unwrap();
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        time::sleep(Duration::from_millis(20)).await;
    }
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let received = server.received_requests().await.unwrap_or_default().len();
        if received >= count {
            return;
        }
        assert!(Instant::now() < deadline, "only {received} requests received");
        time::sleep(Duration::from_millis(20)).await;
    }
}

async fn stop(daemon: Daemon) {
    daemon.shutdown();
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn test_scenario_frame_reaches_registers_modbus_and_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .and(body_json(json!({
            "sensor_id": 101,
            "timestamp": "2023-11-14T22:13:20",
            "temperature": 23.45,
            "pressure": 1013.2,
            "humidity": 55.1
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut daemon = Daemon::new();
    daemon
        .launch(&test_config(Some(format!("{}/data", server.uri()))))
        .await
        .unwrap();
    let bank = daemon.register_bank();

    deliver(daemon.listener_addr().unwrap(), SCENARIO_FRAME).await;
    wait_for(|| bank.read() == SCENARIO_REGISTERS).await;

    let mut ctx = tcp::connect(daemon.modbus_addr().unwrap()).await.unwrap();
    let data = ctx.read_holding_registers(0, 9).await.unwrap().unwrap();
    assert_eq!(data, SCENARIO_REGISTERS.to_vec());
    ctx.disconnect().await.unwrap();

    let forward_stats = daemon.forward_stats().unwrap();
    wait_for(|| forward_stats.snapshot().forwarded == 1).await;

    let listener_stats = daemon.listener_stats().unwrap().snapshot();
    assert_eq!(listener_stats.accepted, 1);
    assert_eq!(listener_stats.processed, 1);

    stop(daemon).await;
}

#[tokio::test]
async fn test_short_frame_is_dropped_and_next_frame_accepted() {
    let server = mock_ingestion(200).await;
    let mut daemon = Daemon::new();
    daemon
        .launch(&test_config(Some(format!("{}/data", server.uri()))))
        .await
        .unwrap();
    let addr = daemon.listener_addr().unwrap();
    let bank = daemon.register_bank();
    let stats = daemon.listener_stats().unwrap();

    deliver(addr, &SCENARIO_FRAME[..10]).await;
    wait_for(|| stats.snapshot().framing_errors == 1).await;
    assert_eq!(bank.read(), [0; 9]);

    deliver(addr, SCENARIO_FRAME).await;
    wait_for(|| bank.read() == SCENARIO_REGISTERS).await;
    wait_for_requests(&server, 1).await;

    stop(daemon).await;
}

#[tokio::test]
async fn test_corrupted_signature_changes_nothing() {
    let server = mock_ingestion(200).await;
    let mut daemon = Daemon::new();
    daemon
        .launch(&test_config(Some(format!("{}/data", server.uri()))))
        .await
        .unwrap();
    let bank = daemon.register_bank();
    let stats = daemon.listener_stats().unwrap();

    let mut frame = SCENARIO_FRAME.to_vec();
    frame[200] ^= 0x40;
    deliver(daemon.listener_addr().unwrap(), &frame).await;
    wait_for(|| stats.snapshot().signature_errors == 1).await;

    // Give a wrongly accepted frame time to show up
    time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bank.read(), [0; 9]);
    assert!(server.received_requests().await.unwrap().is_empty());

    stop(daemon).await;
}

#[tokio::test]
async fn test_frame_split_across_writes_is_accepted() {
    let mut daemon = Daemon::new();
    daemon.launch(&test_config(None)).await.unwrap();
    let bank = daemon.register_bank();

    let mut stream = TcpStream::connect(daemon.listener_addr().unwrap())
        .await
        .unwrap();
    for chunk in SCENARIO_FRAME.chunks(50) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        time::sleep(Duration::from_millis(30)).await;
    }

    wait_for(|| bank.read() == SCENARIO_REGISTERS).await;
    stop(daemon).await;
}

#[tokio::test]
async fn test_stalled_sender_times_out() {
    let mut config = test_config(None);
    config.listener.read_timeout_secs = 1;
    let mut daemon = Daemon::new();
    daemon.launch(&config).await.unwrap();
    let stats = daemon.listener_stats().unwrap();

    // Half a frame, then nothing while keeping the connection open
    let mut stream = TcpStream::connect(daemon.listener_addr().unwrap())
        .await
        .unwrap();
    stream.write_all(&SCENARIO_FRAME[..100]).await.unwrap();

    wait_for(|| stats.snapshot().framing_errors == 1).await;
    assert_eq!(daemon.register_bank().read(), [0; 9]);

    drop(stream);
    stop(daemon).await;
}

#[tokio::test]
async fn test_forward_failure_keeps_registers() {
    let server = mock_ingestion(500).await;
    let mut daemon = Daemon::new();
    daemon
        .launch(&test_config(Some(format!("{}/data", server.uri()))))
        .await
        .unwrap();
    let bank = daemon.register_bank();
    let forward_stats = daemon.forward_stats().unwrap();

    deliver(daemon.listener_addr().unwrap(), SCENARIO_FRAME).await;
    wait_for(|| forward_stats.snapshot().failed == 1).await;
    assert_eq!(bank.read(), SCENARIO_REGISTERS);

    // No retry
    time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    stop(daemon).await;
}

#[tokio::test]
async fn test_latest_reading_wins() {
    let signer = FrameSigner::from_pem_file(fixture("private.pem")).unwrap();
    let mut daemon = Daemon::new();
    daemon.launch(&test_config(None)).await.unwrap();
    let addr = daemon.listener_addr().unwrap();
    let bank = daemon.register_bank();

    for sensor_id in [7i16, 8, 9] {
        let frame = signer.build_frame(&SensorReading {
            sensor_id,
            timestamp: 1_700_000_000 + i64::from(sensor_id),
            temperature: 21.5,
            pressure: 1011.0,
            humidity: 45.25,
        });
        deliver(addr, &frame).await;
        wait_for(|| bank.read()[0] == sensor_id as u16).await;
    }

    let registers = bank.read();
    assert_eq!(registers[0], 9);
    assert_eq!(registers[5..7], [0, 4525]);

    stop(daemon).await;
}

#[tokio::test]
async fn test_missing_public_key_fails_startup() {
    let mut config = test_config(None);
    config.security.public_key = PathBuf::from("/nonexistent/public.pem");

    let mut daemon = Daemon::new();
    let err = daemon.launch(&config).await.unwrap_err();
    let bridge_err = err
        .downcast_ref::<BridgeError>()
        .expect("startup failure should be a BridgeError");
    assert_eq!(bridge_err.kind(), "StartupError");
    assert!(daemon.listener_addr().is_none());
}

#[tokio::test]
async fn test_port_in_use_fails_startup() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = test_config(None);
    config.listener.port = occupied.local_addr().unwrap().port();

    let mut daemon = Daemon::new();
    let err = daemon.launch(&config).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BridgeError>(),
        Some(BridgeError::Startup(_))
    ));
}

#[tokio::test]
async fn test_modbus_disabled() {
    let mut config = test_config(None);
    config.modbus.enabled = false;

    let mut daemon = Daemon::new();
    daemon.launch(&config).await.unwrap();
    assert!(daemon.modbus_addr().is_none());
    assert!(daemon.forward_stats().is_none());

    deliver(daemon.listener_addr().unwrap(), SCENARIO_FRAME).await;
    let bank = daemon.register_bank();
    wait_for(|| bank.read() == SCENARIO_REGISTERS).await;

    stop(daemon).await;
}
