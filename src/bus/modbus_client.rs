// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus master over RTU (serial) or TCP
//!
//! In Modbus terms the gateway is the master (client) and every field device
//! is a slave (server). One `tokio-modbus` client context is kept for the
//! whole bus; the target slave is switched before each request.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};

use super::{BusClient, RegisterBank};
use crate::config::BusConfig;
use crate::error::ReadError;

/// Modbus master bound to one serial line or TCP endpoint.
pub struct ModbusBusClient {
    ctx: client::Context,
    timeout: Duration,
    endpoint: String,
}

impl ModbusBusClient {
    /// Open the serial port described by `config` and attach an RTU master to it.
    pub fn open_rtu(config: &BusConfig) -> Result<Self> {
        let builder = tokio_serial::new(&config.serial_port, config.baudrate)
            .data_bits(data_bits(config.data_bits)?)
            .stop_bits(stop_bits(config.stop_bits)?)
            .parity(parity(&config.parity)?)
            .timeout(Duration::from_millis(config.timeout_ms));

        let port = SerialStream::open(&builder)
            .with_context(|| format!("Failed to open serial port {}", config.serial_port))?;

        info!(
            "Modbus RTU master on {} ({} baud, {}{}{})",
            config.serial_port, config.baudrate, config.data_bits, config.parity, config.stop_bits
        );

        Ok(Self {
            ctx: rtu::attach(port),
            timeout: Duration::from_millis(config.timeout_ms),
            endpoint: config.serial_port.clone(),
        })
    }

    /// Connect a Modbus TCP master to `address:port`.
    pub async fn connect_tcp(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let socket_addr: SocketAddr = format!("{}:{}", address, port)
            .parse()
            .with_context(|| format!("Invalid Modbus TCP address {}:{}", address, port))?;

        let ctx = tokio::time::timeout(timeout, tcp::connect(socket_addr))
            .await
            .with_context(|| format!("Timed out connecting to Modbus TCP {}", socket_addr))?
            .with_context(|| format!("Failed to connect to Modbus TCP {}", socket_addr))?;

        info!("Modbus TCP master connected to {}", socket_addr);

        Ok(Self {
            ctx,
            timeout,
            endpoint: socket_addr.to_string(),
        })
    }

    /// Endpoint this master talks to (serial device path or socket address).
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl BusClient for ModbusBusClient {
    async fn read_registers(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> Result<Vec<u16>, ReadError> {
        self.ctx.set_slave(Slave(slave));
        debug!(
            "Reading {} {} registers from slave {} at 0x{:04X}",
            count, bank, slave, address
        );

        let ctx = &mut self.ctx;
        let request = async move {
            match bank {
                RegisterBank::Holding => ctx.read_holding_registers(address, count).await,
                RegisterBank::Input => ctx.read_input_registers(address, count).await,
            }
        };

        match tokio::time::timeout(self.timeout, request).await {
            Err(_) => Err(ReadError::Timeout {
                slave,
                address,
                bank,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Ok(Err(err)) => Err(ReadError::Transport {
                slave,
                address,
                bank,
                reason: err.to_string(),
            }),
            Ok(Ok(Err(exception))) => Err(ReadError::Exception {
                slave,
                address,
                bank,
                exception: format!("{exception:?}"),
            }),
            Ok(Ok(Ok(words))) => Ok(words),
        }
    }
}

fn data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => anyhow::bail!("Unsupported data bits: {}", other),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => anyhow::bail!("Unsupported stop bits: {}", other),
    }
}

fn parity(parity: &str) -> Result<Parity> {
    match parity {
        "N" => Ok(Parity::None),
        "E" => Ok(Parity::Even),
        "O" => Ok(Parity::Odd),
        other => anyhow::bail!("Unsupported parity: {}", other),
    }
}
