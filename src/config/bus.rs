// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field bus connection configuration

use serde::{Deserialize, Serialize};

/// How the gateway reaches its field devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusTransport {
    /// Modbus RTU over a serial line
    Rtu,
    /// Modbus TCP, typically towards the built-in simulator or a gateway bridge
    Tcp,
    /// In-process simulated devices, no I/O at all
    Simulated,
}

impl std::str::FromStr for BusTransport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rtu" => Ok(BusTransport::Rtu),
            "tcp" => Ok(BusTransport::Tcp),
            "simulated" => Ok(BusTransport::Simulated),
            other => anyhow::bail!("Unknown bus transport '{}'", other),
        }
    }
}

/// Serial line and transport parameters.
///
/// The serial parameters are only used with [`BusTransport::Rtu`], the TCP
/// endpoint only with [`BusTransport::Tcp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub transport: BusTransport,

    /// Serial device, e.g. `/dev/ttyUSB0`.
    pub serial_port: String,

    pub baudrate: u32,

    /// 5 to 8.
    pub data_bits: u8,

    /// 1 or 2.
    pub stop_bits: u8,

    /// `N`, `E` or `O`.
    pub parity: String,

    /// Upper bound for a single register read, in milliseconds.
    pub timeout_ms: u64,

    pub tcp_address: String,

    pub tcp_port: u16,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: BusTransport::Rtu,
            serial_port: "/tmp/ttySIM1".to_string(),
            baudrate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: "N".to_string(),
            timeout_ms: 2000,
            tcp_address: "127.0.0.1".to_string(),
            tcp_port: 5020,
        }
    }
}

/// Register read cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a cached register block, in milliseconds.
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 5000 }
    }
}
