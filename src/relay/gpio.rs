// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Raspberry Pi GPIO relay outputs
//!
//! Relay boards are driven active-high and every line starts low (relay off).

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use log::{debug, info};
use rppal::gpio::{Gpio, OutputPin};

use super::RelayActuator;
use crate::error::ActuationError;

/// Relay actuator backed by BCM GPIO output lines.
pub struct GpioRelayActuator {
    lines: HashMap<String, OutputPin>,
}

impl GpioRelayActuator {
    /// Claim every configured line as an output, initially low.
    pub fn new(pins: &BTreeMap<String, u8>) -> Result<Self> {
        let gpio = Gpio::new().context("Failed to access the GPIO peripheral")?;

        let mut lines = HashMap::new();
        for (name, pin) in pins {
            let output = gpio
                .get(*pin)
                .with_context(|| format!("Failed to claim GPIO line {} for relay {}", pin, name))?
                .into_output_low();
            debug!("Relay {} bound to GPIO line {}", name, pin);
            lines.insert(name.clone(), output);
        }

        info!("GPIO relay outputs ready ({} lines)", lines.len());
        Ok(Self { lines })
    }
}

#[async_trait::async_trait]
impl RelayActuator for GpioRelayActuator {
    async fn set_state(&mut self, relay: &str, on: bool) -> Result<(), ActuationError> {
        let line = self
            .lines
            .get_mut(relay)
            .ok_or_else(|| ActuationError::Unmapped {
                name: relay.to_string(),
            })?;

        if on {
            line.set_high();
        } else {
            line.set_low();
        }
        Ok(())
    }
}
