// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Gateway identity and polling configuration

use serde::{Deserialize, Serialize};

/// General gateway settings.
///
/// # Example
///
/// ```
/// use rust_field_gateway::config::GatewayConfig;
///
/// let gateway = GatewayConfig {
///     name: "greenhouse-1".to_string(),
///     interval_secs: 30,
///     ..GatewayConfig::default()
/// };
/// assert_eq!(gateway.location, "");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Human-readable gateway name.
    pub name: String,

    /// Free-form installation location.
    #[serde(default)]
    pub location: String,

    /// Seconds between two polling cycles.
    pub interval_secs: u64,

    /// When set, the latest snapshot is written to this file as JSON after
    /// every cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_file: Option<String>,

    /// When set, every snapshot is appended to this file as one JSON line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_log_file: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "nuGateway".to_string(),
            location: String::new(),
            interval_secs: 10,
            snapshot_file: None,
            data_log_file: None,
        }
    }
}
