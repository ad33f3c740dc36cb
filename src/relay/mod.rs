// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Relay outputs
//!
//! This module provides:
//! - [`RelayActuator`]: the capability that switches a physical output
//! - [`RelayBank`]: the current state of every logical relay, with manual pinning
//! - [`RelayAutomationPolicy`]: the fixed rules deriving relay states from a snapshot
//!
//! Actuator implementations:
//! - Simulated: records and logs the outputs, no hardware required
//! - GPIO: Raspberry Pi output lines through `rppal` (feature `gpio`)

pub mod bank;
#[cfg(feature = "gpio")]
pub mod gpio;
pub mod policy;
pub mod simulated;

use anyhow::Result;
use log::info;

use crate::config::{ActuatorKind, RelayConfig};
use crate::error::ActuationError;

pub use bank::{create_shared_relay_bank, RelayBank, RelayDescriptor, SharedRelayBank};
#[cfg(feature = "gpio")]
pub use gpio::GpioRelayActuator;
pub use policy::RelayAutomationPolicy;
pub use simulated::SimulatedRelayActuator;

/// Logical relay names, in display order.
pub const RELAY_NAMES: [&str; 8] = [
    "led_light",
    "display",
    "load1",
    "load2",
    "load3",
    "load4",
    "fan",
    "heater",
];

/// Switches one physical output.
#[async_trait::async_trait]
pub trait RelayActuator: Send {
    /// Drive the output bound to `relay` on or off.
    async fn set_state(&mut self, relay: &str, on: bool) -> Result<(), ActuationError>;
}

/// Build the actuator selected by the configuration.
pub fn create_actuator(config: &RelayConfig) -> Result<Box<dyn RelayActuator>> {
    match config.actuator {
        ActuatorKind::Simulated => {
            info!("Using simulated relay outputs");
            Ok(Box::new(SimulatedRelayActuator::new(config.pins.clone())))
        }
        #[cfg(feature = "gpio")]
        ActuatorKind::Gpio => {
            info!("Using GPIO relay outputs");
            Ok(Box::new(GpioRelayActuator::new(&config.pins)?))
        }
        #[cfg(not(feature = "gpio"))]
        ActuatorKind::Gpio => {
            anyhow::bail!("GPIO relay outputs require the 'gpio' feature")
        }
    }
}
