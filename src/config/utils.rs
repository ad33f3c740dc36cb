// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::debug;

use super::{Config, CONFIG_SCHEMA};
use crate::relay::RELAY_NAMES;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_field_gateway --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Alarm thresholds**: `temp_alarm_low` must be strictly below `temp_alarm_high`
/// - **Serial framing**: 5 to 8 data bits, 1 or 2 stop bits
/// - **Scheduling**: poll interval and alarm history size of at least one
/// - **Relay lines**: only the eight known relay names, each on its own line
/// - **Addresses**: TCP bus endpoint and simulator bind address must be IP addresses
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let alarms = &config.alarms;
    if alarms.temp_alarm_low >= alarms.temp_alarm_high {
        anyhow::bail!(
            "temp_alarm_low ({}) must be lower than temp_alarm_high ({})",
            alarms.temp_alarm_low,
            alarms.temp_alarm_high
        );
    }
    if alarms.max_history == 0 {
        anyhow::bail!("Alarm history size must be at least 1");
    }

    if !(5..=8).contains(&config.bus.data_bits) {
        anyhow::bail!("Invalid data bits: {}", config.bus.data_bits);
    }
    if !matches!(config.bus.stop_bits, 1 | 2) {
        anyhow::bail!("Invalid stop bits: {}", config.bus.stop_bits);
    }

    if config.gateway.interval_secs == 0 {
        anyhow::bail!("Poll interval must be at least 1 second");
    }

    let mut used_lines: HashMap<u8, &str> = HashMap::new();
    for (name, pin) in &config.relays.pins {
        if !RELAY_NAMES.contains(&name.as_str()) {
            anyhow::bail!("Unknown relay '{}' in relay pin map", name);
        }
        if let Some(other) = used_lines.insert(*pin, name) {
            anyhow::bail!(
                "Relays '{}' and '{}' are both mapped to line {}",
                other,
                name,
                pin
            );
        }
    }

    if !is_valid_ip_address(&config.bus.tcp_address) {
        anyhow::bail!("Invalid bus TCP address: {}", config.bus.tcp_address);
    }
    if !is_valid_ip_address(&config.simulator.address) {
        anyhow::bail!("Invalid simulator address: {}", config.simulator.address);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ip_address() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("gateway.local"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_inverted_temperature_thresholds_rejected() {
        let mut config = Config::default();
        config.alarms.temp_alarm_low = 40.0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_shared_relay_line_rejected() {
        let mut config = Config::default();
        config.relays.pins.insert("fan".to_string(), 5);
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("line 5"));
    }

    #[test]
    fn test_unknown_relay_rejected() {
        let mut config = Config::default();
        config.relays.pins.insert("pump".to_string(), 4);
        assert!(validate_specific_rules(&config).is_err());
    }
}
