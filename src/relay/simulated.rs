// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated relay outputs
//!
//! Output levels are only stored and logged, which allows development and
//! testing on machines without relay hardware.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::info;

use super::RelayActuator;
use crate::error::ActuationError;

/// Output levels by relay name, readable from outside the actuator.
pub type SimulatedOutputs = Arc<Mutex<BTreeMap<String, bool>>>;

/// Relay actuator without hardware.
pub struct SimulatedRelayActuator {
    pins: BTreeMap<String, u8>,
    outputs: SimulatedOutputs,
}

impl SimulatedRelayActuator {
    pub fn new(pins: BTreeMap<String, u8>) -> Self {
        Self {
            pins,
            outputs: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Handle on the recorded output levels.
    pub fn outputs(&self) -> SimulatedOutputs {
        self.outputs.clone()
    }
}

#[async_trait::async_trait]
impl RelayActuator for SimulatedRelayActuator {
    async fn set_state(&mut self, relay: &str, on: bool) -> Result<(), ActuationError> {
        let pin = self.pins.get(relay).ok_or_else(|| ActuationError::Unmapped {
            name: relay.to_string(),
        })?;

        let mut outputs = self.outputs.lock().map_err(|_| ActuationError::Output {
            name: relay.to_string(),
            reason: "simulated output table poisoned".to_string(),
        })?;
        let previous = outputs.insert(relay.to_string(), on);
        if previous != Some(on) {
            info!(
                "[SIM] Relay {} (line {}) -> {}",
                relay,
                pin,
                if on { "ON" } else { "OFF" }
            );
        }
        Ok(())
    }
}
