// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field bus access
//!
//! The gateway talks to its sensors through a [`BusClient`], an abstraction
//! over "read `count` registers of `bank` at `address` on slave `slave`".
//! Two implementations are provided:
//!
//! - [`ModbusBusClient`]: Modbus RTU over a serial line, or Modbus TCP
//! - [`SimulatedBus`]: in-process register model of the field devices
//!
//! A bus client is owned by exactly one acquisition pipeline, and every read
//! takes `&mut self`, so reads on the half-duplex line never overlap.

pub mod modbus_client;
pub mod simulated;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{BusConfig, BusTransport};
use crate::error::{DecodeError, ReadError};

pub use modbus_client::ModbusBusClient;
pub use simulated::{SharedDevices, SimulatedBus, SimulatedDevices};

/// The two register spaces a Modbus slave exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterBank {
    /// Read/write registers (function code 0x03)
    Holding,
    /// Read-only registers (function code 0x04)
    Input,
}

impl fmt::Display for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterBank::Holding => write!(f, "holding"),
            RegisterBank::Input => write!(f, "input"),
        }
    }
}

/// Identity of one register read: which words, from which device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterKey {
    pub slave: u8,
    pub address: u16,
    pub count: u16,
    pub bank: RegisterBank,
}

impl RegisterKey {
    pub const fn holding(slave: u8, address: u16, count: u16) -> Self {
        Self {
            slave,
            address,
            count,
            bank: RegisterBank::Holding,
        }
    }

    pub const fn input(slave: u8, address: u16, count: u16) -> Self {
        Self {
            slave,
            address,
            count,
            bank: RegisterBank::Input,
        }
    }
}

impl fmt::Display for RegisterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slave {} {} 0x{:04X}+{}",
            self.slave, self.bank, self.address, self.count
        )
    }
}

/// Words returned by one successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRegisterBlock {
    pub slave: u8,
    pub base_address: u16,
    pub bank: RegisterBank,
    pub words: Vec<u16>,
}

impl RawRegisterBlock {
    pub fn new(key: RegisterKey, words: Vec<u16>) -> Self {
        Self {
            slave: key.slave,
            base_address: key.address,
            bank: key.bank,
            words,
        }
    }

    /// The single word of a one-register read.
    pub fn word(&self) -> Result<u16, DecodeError> {
        match self.words.as_slice() {
            [w] => Ok(*w),
            other => Err(self.wrong_count(1, other.len())),
        }
    }

    /// The two words of a split 32-bit value, most significant first.
    pub fn pair(&self) -> Result<[u16; 2], DecodeError> {
        match self.words.as_slice() {
            [hi, lo] => Ok([*hi, *lo]),
            other => Err(self.wrong_count(2, other.len())),
        }
    }

    fn wrong_count(&self, expected: usize, actual: usize) -> DecodeError {
        DecodeError::WordCount {
            slave: self.slave,
            address: self.base_address,
            expected,
            actual,
        }
    }
}

/// Register-level access to the field bus.
#[async_trait::async_trait]
pub trait BusClient {
    /// Read `count` consecutive registers starting at `address`.
    async fn read_registers(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> Result<Vec<u16>, ReadError>;
}

#[async_trait::async_trait]
impl<B: BusClient + Send + ?Sized> BusClient for Box<B> {
    async fn read_registers(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> Result<Vec<u16>, ReadError> {
        (**self).read_registers(slave, address, count, bank).await
    }
}

/// Build the bus client selected by the configuration.
///
/// `devices` backs the `simulated` transport; when absent a fresh randomized
/// register model is created.
pub async fn connect(
    config: &BusConfig,
    devices: Option<SharedDevices>,
) -> Result<Box<dyn BusClient + Send>> {
    let timeout = Duration::from_millis(config.timeout_ms);
    match config.transport {
        BusTransport::Rtu => Ok(Box::new(ModbusBusClient::open_rtu(config)?)),
        BusTransport::Tcp => Ok(Box::new(
            ModbusBusClient::connect_tcp(&config.tcp_address, config.tcp_port, timeout).await?,
        )),
        BusTransport::Simulated => {
            let devices = devices.unwrap_or_else(SimulatedDevices::shared_randomized);
            Ok(Box::new(SimulatedBus::new(devices)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_shape_checks() {
        let key = RegisterKey::holding(123, 0x000E, 2);
        let block = RawRegisterBlock::new(key, vec![0x41AC, 0x0000]);
        assert_eq!(block.pair().unwrap(), [0x41AC, 0x0000]);
        assert!(matches!(
            block.word(),
            Err(DecodeError::WordCount {
                expected: 1,
                actual: 2,
                ..
            })
        ));

        let short = RawRegisterBlock::new(key, vec![0x41AC]);
        assert_eq!(
            short.pair(),
            Err(DecodeError::WordCount {
                slave: 123,
                address: 0x000E,
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn test_key_display() {
        let key = RegisterKey::input(4, 0x3020, 1);
        assert_eq!(key.to_string(), "slave 4 input 0x3020+1");
    }
}
