// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the field gateway
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `gateway`: Gateway identity and polling interval
//! - `bus`: Serial line / TCP parameters used to reach the field devices
//! - `cache`: Register read cache lifetime
//! - `alarms`: Alarm thresholds
//! - `relays`: Relay actuator backend and output lines
//! - `simulator`: Built-in Modbus TCP device simulator
//!
//! ## Usage
//!
//! ```no_run
//! use rust_field_gateway::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("/dev/ttyUSB0".to_string()), // Serial port
//!     Some(19200),                      // Baud rate
//!     None,                             // Transport
//!     Some(5),                          // Poll interval
//!     None,                             // Simulator
//! );
//!
//! println!("Polling every {} s", config.gateway.interval_secs);
//! ```

pub mod alarm;
pub mod bus;
pub mod gateway;
pub mod relay;
pub mod simulator;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use alarm::AlarmConfig;
pub use bus::{BusConfig, BusTransport, CacheConfig};
pub use gateway::GatewayConfig;
pub use relay::{ActuatorKind, RelayConfig};
pub use simulator::SimulatorConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// JSON schema every configuration file is validated against.
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure for the field gateway.
///
/// Every section falls back to its defaults when missing from the file, so a
/// minimal configuration only needs the values that differ from the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Settings of the serial bus (or its TCP/simulated stand-ins).
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Alarm thresholds, consumed read-only by the alarm engine.
    #[serde(default)]
    pub alarms: AlarmConfig,

    #[serde(default)]
    pub relays: RelayConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails schema
    /// validation, deserialization or the semantic checks leaves a
    /// `*.sample.yaml` next to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents).or_else(|err| {
            if let Err(sample_err) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", sample_err);
            }
            Err(err.context(format!("Invalid configuration in {}", path.display())))
        })
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = serde_yml::from_str(contents).map_err(|err| {
            error!("Configuration deserialization error: {}", err);
            anyhow::anyhow!("Failed to deserialize configuration: {}", err)
        })?;

        utils::validate_specific_rules(&config)?;

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that were actually given override the file.
    ///
    /// # Parameters
    ///
    /// * `serial_port` - Serial device used for Modbus RTU
    /// * `baudrate` - Serial line speed
    /// * `transport` - Bus transport (`rtu`, `tcp` or `simulated`)
    /// * `interval_secs` - Seconds between polling cycles
    /// * `simulator_enabled` - Start the built-in Modbus TCP simulator
    pub fn apply_args(
        &mut self,
        serial_port: Option<String>,
        baudrate: Option<u32>,
        transport: Option<BusTransport>,
        interval_secs: Option<u64>,
        simulator_enabled: Option<bool>,
    ) {
        if let Some(port) = serial_port {
            debug!("Overriding serial port from command line: {}", port);
            self.bus.serial_port = port;
        }
        if let Some(baudrate) = baudrate {
            debug!("Overriding baud rate from command line: {}", baudrate);
            self.bus.baudrate = baudrate;
        }
        if let Some(transport) = transport {
            debug!("Overriding bus transport from command line: {:?}", transport);
            self.bus.transport = transport;
        }
        if let Some(interval) = interval_secs {
            debug!("Overriding poll interval from command line: {}", interval);
            self.gateway.interval_secs = interval;
        }
        if let Some(enabled) = simulator_enabled {
            debug!("Overriding simulator enabled from command line: {}", enabled);
            self.simulator.enabled = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_field_installation() {
        let config = Config::default();
        assert_eq!(config.gateway.interval_secs, 10);
        assert_eq!(config.bus.transport, BusTransport::Rtu);
        assert_eq!(config.bus.baudrate, 9600);
        assert_eq!(config.cache.ttl_ms, 5000);
        assert!(config.alarms.enabled);
        assert_eq!(config.alarms.battery_soc_alarm_low, 20);
        assert_eq!(config.relays.pins.len(), 8);
        assert!(!config.simulator.enabled);
    }

    #[test]
    fn test_default_config_passes_its_own_schema() {
        let yaml = serde_yml::to_string(&Config::default()).unwrap();
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.bus.serial_port, "/tmp/ttySIM1");
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = Config::from_yaml_str("gateway:\n  name: shed\n  interval_secs: 30\n").unwrap();
        assert_eq!(config.gateway.name, "shed");
        assert_eq!(config.gateway.interval_secs, 30);
        assert_eq!(config.alarms.temp_alarm_high, 35.0);
    }

    #[test]
    fn test_schema_rejects_unknown_transport() {
        let result = Config::from_yaml_str(
            "bus:\n  transport: can\n  serial_port: /dev/ttyUSB0\n  baudrate: 9600\n  data_bits: 8\n  stop_bits: 1\n  parity: N\n  timeout_ms: 1000\n  tcp_address: 127.0.0.1\n  tcp_port: 502\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_args_overrides_only_given_values() {
        let mut config = Config::default();
        config.apply_args(
            Some("/dev/ttyAMA0".to_string()),
            None,
            Some(BusTransport::Simulated),
            None,
            Some(true),
        );
        assert_eq!(config.bus.serial_port, "/dev/ttyAMA0");
        assert_eq!(config.bus.baudrate, 9600);
        assert_eq!(config.bus.transport, BusTransport::Simulated);
        assert_eq!(config.gateway.interval_secs, 10);
        assert!(config.simulator.enabled);
    }
}
