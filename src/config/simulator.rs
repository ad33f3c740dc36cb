// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP device simulator configuration

use serde::{Deserialize, Serialize};

/// Settings for the built-in Modbus TCP server exposing simulated devices.
///
/// # Example
///
/// ```
/// use rust_field_gateway::config::SimulatorConfig;
///
/// let simulator = SimulatorConfig {
///     enabled: true,
///     port: 1502,
///     ..SimulatorConfig::default()
/// };
/// assert_eq!(simulator.address, "127.0.0.1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Disabled by default; a production gateway talks to real hardware.
    pub enabled: bool,

    pub address: String,

    pub port: u16,

    /// Seconds between two draws of new simulated values.
    pub refresh_secs: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".to_string(),
            port: 5020,
            refresh_secs: 5,
        }
    }
}
