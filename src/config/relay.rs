// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Relay output configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which backend drives the relay outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Outputs are only recorded and logged
    Simulated,
    /// Raspberry Pi GPIO lines (requires the `gpio` feature)
    Gpio,
}

/// Relay outputs and their physical lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub actuator: ActuatorKind,

    /// When true a manual command pins the relay until it is released;
    /// when false the next automation pass may overwrite it.
    #[serde(default = "default_manual_override_hold")]
    pub manual_override_hold: bool,

    /// Logical relay name to BCM GPIO line.
    pub pins: BTreeMap<String, u8>,
}

fn default_manual_override_hold() -> bool {
    true
}

impl Default for RelayConfig {
    fn default() -> Self {
        let pins = [
            ("led_light", 5),
            ("display", 6),
            ("load1", 13),
            ("load2", 19),
            ("load3", 20),
            ("load4", 16),
            ("fan", 26),
            ("heater", 21),
        ]
        .into_iter()
        .map(|(name, pin)| (name.to_string(), pin))
        .collect();

        Self {
            actuator: ActuatorKind::Simulated,
            manual_override_hold: default_manual_override_hold(),
            pins,
        }
    }
}
