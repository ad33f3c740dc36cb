// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus device simulator
//!
//! This module provides a Modbus TCP server that impersonates the field
//! devices, so the gateway can be exercised end-to-end without hardware.
//!
//! ## Key Components
//!
//! - `SensorSimulatorServer`: the `tokio-modbus` service answering read
//!   requests from the shared register model
//! - `serve_simulator`: accept loop binding the service to a TCP listener
//!
//! ## Usage
//!
//! ```no_run
//! use rust_field_gateway::bus::SimulatedDevices;
//! use rust_field_gateway::modbus::serve_simulator;
//! use tokio::net::TcpListener;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:5020").await?;
//! serve_simulator(listener, SimulatedDevices::shared_randomized()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Register Map
//!
//! The unit identifier selects the simulated device, see
//! [`crate::bus::simulated`] for the per-device layout. Only Read Holding
//! Registers (0x03) and Read Input Registers (0x04) are implemented.

pub mod modbus_server;
pub use modbus_server::{serve_simulator, SensorSimulatorServer};
