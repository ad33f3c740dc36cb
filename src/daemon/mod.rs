// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module provides functionality for running and managing the
//! background services of the gateway: the polling loop, the optional
//! Modbus device simulator and system monitoring.
//!
//! ## Components
//!
//! * **Launch Daemon**: Core implementation for starting, monitoring, and gracefully
//!   shutting down background tasks
//! * **Gateway**: one polling cycle (`GatewayCycle`) and the shared state it
//!   publishes (`GatewayHandle`)
//!
//! ## Usage
//!
//! ```no_run
//! use rust_field_gateway::{config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod gateway;
pub mod launch_daemon;

pub use gateway::{CycleReport, GatewayCycle, GatewayHandle};
pub use launch_daemon::Daemon;
