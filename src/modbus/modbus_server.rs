// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the sensor bridge
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! The Modbus master is the device that requests data, while the Modbus slave is the device
//! that provides data. In other words, the Modbus master is here the SCADA poller and the
//! Modbus slave is here the bridge.
//!
//! Only function code 0x03 (Read Holding Registers) is served. The register
//! contents come from a [`RegisterBank`] snapshot taken once per request, so a
//! response never mixes two sensor updates.

use std::{future, net::SocketAddr};

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::registers::{RegisterBank, REGISTER_COUNT};

/// Largest quantity a single Read Holding Registers request may ask for
const MAX_READ_QUANTITY: u16 = 125;

/// A read-only Modbus TCP service over the bridge register bank.
///
/// Addresses 0 to 8 map one-to-one onto the bank registers. Every write
/// function code, and every read outside the holding register table, is
/// answered with an exception.
#[derive(Debug, Clone)]
pub struct BridgeModbusService {
    bank: RegisterBank,
}

impl tokio_modbus::server::Service for BridgeModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    ///
    /// - 0x03: Read Holding Registers, served from a bank snapshot
    ///
    /// Any other function code will return an IllegalFunction exception.
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {}",
                    cnt, addr
                );
                register_read(&self.bank.read(), addr, cnt).map(Response::ReadHoldingRegisters)
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            error!("Modbus request error: {:?}", e);
        }

        future::ready(res)
    }
}

impl BridgeModbusService {
    pub fn new(bank: RegisterBank) -> Self {
        Self { bank }
    }
}

/// Serve Modbus TCP on an already bound listener until the task is aborted
///
/// Each client connection gets its own service value sharing the same bank.
pub async fn serve(listener: TcpListener, bank: RegisterBank) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("Modbus server listening on {}", local_addr);

    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr: SocketAddr| {
        let bank = bank.clone();
        debug!("Modbus client connected from {}", socket_addr);
        async move {
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(BridgeModbusService::new(bank.clone())))
            })
        }
    };

    let on_process_error = |err| {
        error!("Modbus server error: {err}");
    };

    server.serve(&on_connected, on_process_error).await?;
    Ok(())
}

/// Helper function for reading a window of the register snapshot
///
/// ### Errors
///
/// * `ExceptionCode::IllegalDataValue` if the quantity is 0 or above 125
/// * `ExceptionCode::IllegalDataAddress` if any requested address is past
///   the last register
fn register_read(
    registers: &[u16; REGISTER_COUNT],
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    if cnt == 0 || cnt > MAX_READ_QUANTITY {
        error!("Exception::IllegalDataValue - Invalid quantity {}", cnt);
        return Err(ExceptionCode::IllegalDataValue);
    }

    let start = usize::from(addr);
    let end = start + usize::from(cnt);
    match registers.get(start..end) {
        Some(window) => {
            debug!("Successfully read {} registers from address {}", cnt, addr);
            Ok(window.to_vec())
        }
        None => {
            error!(
                "Exception::IllegalDataAddress - Registers {}..{} outside 0..{}",
                start, end, REGISTER_COUNT
            );
            Err(ExceptionCode::IllegalDataAddress)
        }
    }
}
