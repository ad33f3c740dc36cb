// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server answering for the simulated field devices
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//! In other words the gateway is the client and this simulator is the server.
//!
//! One TCP endpoint serves every simulated slave: the unit identifier of each
//! request selects the device.

use std::future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::bus::{RegisterBank, SharedDevices};

/// `tokio-modbus` service over a shared register model.
#[derive(Clone)]
pub struct SensorSimulatorServer {
    devices: SharedDevices,
}

impl SensorSimulatorServer {
    pub fn new(devices: SharedDevices) -> Self {
        Self { devices }
    }

    fn read(&self, slave: u8, bank: RegisterBank, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let devices = self.devices.lock().map_err(|_| {
            error!("SERVER: register model poisoned");
            ExceptionCode::ServerDeviceFailure
        })?;

        match devices.read(slave, bank, addr, cnt) {
            Some(result) => result.inspect_err(|_| {
                debug!(
                    "SERVER: Exception::IllegalDataAddress slave {} {} 0x{:04X}+{}",
                    slave, bank, addr, cnt
                );
            }),
            None => {
                debug!("SERVER: no simulated device at slave {}", slave);
                Err(ExceptionCode::GatewayTargetDevice)
            }
        }
    }
}

impl tokio_modbus::server::Service for SensorSimulatorServer {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let slave = req.slave;
        let res = match req.request {
            Request::ReadHoldingRegisters(addr, cnt) => self
                .read(slave, RegisterBank::Holding, addr, cnt)
                .map(Response::ReadHoldingRegisters),
            Request::ReadInputRegisters(addr, cnt) => self
                .read(slave, RegisterBank::Input, addr, cnt)
                .map(Response::ReadInputRegisters),
            other => {
                error!("SERVER: Exception::IllegalFunction - Unimplemented function code in request: {other:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

/// Serve the simulated devices on `listener` until the task is aborted.
pub async fn serve_simulator(listener: TcpListener, devices: SharedDevices) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .context("Simulator listener has no local address")?;
    info!("Modbus device simulator listening on {}", local_addr);

    let server = Server::new(listener);
    let service = SensorSimulatorServer::new(devices);

    let on_connected = move |stream, socket_addr: SocketAddr| {
        let service = service.clone();
        async move {
            debug!("Simulator client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(service.clone()))
            })
        }
    };

    let on_process_error = |err| {
        error!("Modbus simulator error: {err}");
    };

    server
        .serve(&on_connected, on_process_error)
        .await
        .context("Modbus simulator server failed")?;
    Ok(())
}
