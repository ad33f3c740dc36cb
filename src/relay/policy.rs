// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Relay automation rules
//!
//! | Relay | Rule |
//! |-------|------|
//! | led_light | on when dark |
//! | display | on when motion was detected |
//! | load1, load2 | off in BMS low power mode |
//! | fan | on above 30°C, off below 25°C, held in between |
//! | heater | on below 15°C, off above 20°C, held in between |
//!
//! load3 and load4 have no rule and only change on manual command.

use std::collections::BTreeMap;

use crate::acquisition::Snapshot;
use crate::error::ActuationError;

use super::bank::RelayBank;

pub const FAN_ON_ABOVE: f64 = 30.0;
pub const FAN_OFF_BELOW: f64 = 25.0;
pub const HEATER_ON_BELOW: f64 = 15.0;
pub const HEATER_OFF_ABOVE: f64 = 20.0;

/// Derives desired relay states from a snapshot and the previous states.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayAutomationPolicy;

impl RelayAutomationPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Desired states for the relays that have a rule.
    ///
    /// Missing measurements fall back to: not dark, no motion, not in low
    /// power mode. Without a temperature the fan and heater are left out,
    /// which keeps their previous state.
    pub fn decide(
        &self,
        snapshot: &Snapshot,
        previous: &BTreeMap<String, bool>,
    ) -> Vec<(&'static str, bool)> {
        let low_power = snapshot.bms_low_power_mode.unwrap_or(false);

        let mut desired = vec![
            ("led_light", snapshot.is_dark.unwrap_or(false)),
            ("display", snapshot.display_should_be_on.unwrap_or(false)),
            ("load1", !low_power),
            ("load2", !low_power),
        ];

        if let Some(temperature) = snapshot.temperature {
            let fan_was_on = previous.get("fan").copied().unwrap_or(false);
            desired.push(("fan", fan_state(temperature, fan_was_on)));

            let heater_was_on = previous.get("heater").copied().unwrap_or(false);
            desired.push(("heater", heater_state(temperature, heater_was_on)));
        }

        desired
    }

    /// Decide and write through the bank. Returns the failed writes.
    pub async fn apply(&self, snapshot: &Snapshot, bank: &mut RelayBank) -> Vec<ActuationError> {
        let desired = self.decide(snapshot, &bank.states());
        bank.apply_automatic(&desired).await
    }
}

fn fan_state(temperature: f64, was_on: bool) -> bool {
    if temperature > FAN_ON_ABOVE {
        true
    } else if temperature < FAN_OFF_BELOW {
        false
    } else {
        was_on
    }
}

fn heater_state(temperature: f64, was_on: bool) -> bool {
    if temperature < HEATER_ON_BELOW {
        true
    } else if temperature > HEATER_OFF_ABOVE {
        false
    } else {
        was_on
    }
}
