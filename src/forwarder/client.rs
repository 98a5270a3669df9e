// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTPS client for the ingestion endpoint

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::StatusCode;
use url::Url;

use crate::config::ForwarderConfig;
use crate::error::ForwardError;
use crate::frame::ForwardReading;

/// Posts normalized readings to the ingestion endpoint
///
/// One POST per reading with a JSON body, success is exactly HTTP 200.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    url: Url,
}

impl Forwarder {
    /// Build a forwarder from the `forwarder` configuration section
    ///
    /// When `ca_cert` is set the PEM certificate is added to the trusted roots,
    /// which is how a self-signed ingestion endpoint is reached.
    ///
    /// ### Errors
    ///
    /// Fails if the URL does not parse, the CA file cannot be read or parsed,
    /// or the HTTP client cannot be initialised.
    pub fn from_config(config: &ForwarderConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .with_context(|| format!("Invalid forwarder URL: {}", config.url))?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("sensor-bridge/", env!("CARGO_PKG_VERSION")));

        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        if let Some(ca_path) = &config.ca_cert {
            let pem = fs::read(ca_path)
                .with_context(|| format!("Failed to read CA certificate at {:?}", ca_path))?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid CA certificate at {:?}", ca_path))?;
            builder = builder.add_root_certificate(certificate);
            debug!("Trusting additional CA certificate from {:?}", ca_path);
        }

        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST one reading
    ///
    /// ### Errors
    ///
    /// * `ForwardError::Status` for any answer other than 200
    /// * `ForwardError::Transport` for connection, TLS or timeout failures
    pub async fn send(&self, reading: &ForwardReading) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(reading)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            info!(
                "Reading from sensor {} at {} forwarded",
                reading.sensor_id, reading.timestamp
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ForwardError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
