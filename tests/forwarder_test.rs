// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the HTTPS forwarder against a mocked ingestion endpoint

use std::time::Duration;

use serde_json::json;
use tokio::time;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sensor_bridge::config::ForwarderConfig;
use sensor_bridge::forwarder::{spawn_worker, Forwarder};
use sensor_bridge::frame::{encode_for_forward, ForwardReading, SensorReading};
use sensor_bridge::ForwardError;

fn scenario_forward() -> ForwardReading {
    encode_for_forward(&SensorReading {
        sensor_id: 101,
        timestamp: 1_700_000_000,
        temperature: 23.45,
        pressure: 1013.20,
        humidity: 55.10,
    })
    .unwrap()
}

fn forwarder_for(url: String) -> Forwarder {
    let config = ForwarderConfig {
        url,
        timeout_secs: 2,
        ..Default::default()
    };
    Forwarder::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_posts_scenario_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .and(header("content-type", "application/json"))
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

    let forwarder = forwarder_for(format!("{}/data", server.uri()));
    forwarder.send(&scenario_forward()).await.unwrap();
}

#[tokio::test]
async fn test_non_200_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("ingestion down"))
        .mount(&server)
        .await;

    let forwarder = forwarder_for(format!("{}/data", server.uri()));
    let err = forwarder.send(&scenario_forward()).await.unwrap_err();
    match err {
        ForwardError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "ingestion down");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_other_success_codes_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let forwarder = forwarder_for(format!("{}/data", server.uri()));
    let err = forwarder.send(&scenario_forward()).await.unwrap_err();
    assert!(matches!(err, ForwardError::Status { status: 201, .. }));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().port()
    };

    let forwarder = forwarder_for(format!("http://127.0.0.1:{}/data", port));
    let err = forwarder.send(&scenario_forward()).await.unwrap_err();
    assert!(matches!(err, ForwardError::Transport(_)));
}

#[tokio::test]
async fn test_worker_counts_outcomes_and_stops_when_queue_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "sensor_id": 1,
            "timestamp": "2023-11-14T22:13:20",
            "temperature": 1.0,
            "pressure": 2.0,
            "humidity": 3.0
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (queue, worker) = spawn_worker(forwarder_for(format!("{}/data", server.uri())), 8);
    let stats = queue.stats();

    let accepted = ForwardReading {
        sensor_id: 1,
        timestamp: "2023-11-14T22:13:20".to_string(),
        temperature: 1.0,
        pressure: 2.0,
        humidity: 3.0,
    };
    queue.enqueue(accepted.clone()).unwrap();
    queue.enqueue(accepted).unwrap();
    queue.enqueue(scenario_forward()).unwrap();
    drop(queue);

    time::timeout(Duration::from_secs(10), worker)
        .await
        .expect("worker did not stop")
        .unwrap()
        .unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.forwarded, 2);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.dropped, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
