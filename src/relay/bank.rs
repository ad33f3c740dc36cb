// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Relay state bookkeeping
//!
//! [`RelayBank`] owns the actuator and the last known state of every logical
//! relay. Both the automation policy and manual commands go through it, so a
//! single lock around the bank serializes all output writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{RelayActuator, RELAY_NAMES};
use crate::error::ActuationError;

/// Last known state of one relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayDescriptor {
    pub name: String,
    pub state: bool,
    /// Pinned by a manual command, ignored by automation until released.
    pub manual: bool,
}

/// All logical relays and the actuator driving them.
pub struct RelayBank {
    relays: Vec<RelayDescriptor>,
    actuator: Box<dyn RelayActuator>,
    manual_override_hold: bool,
}

impl RelayBank {
    /// Every relay starts off and unpinned.
    pub fn new(actuator: Box<dyn RelayActuator>, manual_override_hold: bool) -> Self {
        let relays = RELAY_NAMES
            .iter()
            .map(|name| RelayDescriptor {
                name: name.to_string(),
                state: false,
                manual: false,
            })
            .collect();

        Self {
            relays,
            actuator,
            manual_override_hold,
        }
    }

    pub fn descriptors(&self) -> &[RelayDescriptor] {
        &self.relays
    }

    pub fn state(&self, name: &str) -> Option<bool> {
        self.find(name).map(|relay| relay.state)
    }

    pub fn is_manual(&self, name: &str) -> bool {
        self.find(name).is_some_and(|relay| relay.manual)
    }

    /// Relay name to state.
    pub fn states(&self) -> BTreeMap<String, bool> {
        self.relays
            .iter()
            .map(|relay| (relay.name.clone(), relay.state))
            .collect()
    }

    /// Operator command: switch `name` and, when holding is enabled, pin it.
    pub async fn set_manual(&mut self, name: &str, on: bool) -> Result<(), ActuationError> {
        let index = self.index_of(name)?;
        self.actuator.set_state(name, on).await?;

        let hold = self.manual_override_hold;
        let relay = &mut self.relays[index];
        relay.state = on;
        relay.manual = hold;
        info!(
            "Relay {} set {} manually{}",
            name,
            if on { "ON" } else { "OFF" },
            if hold { " (held)" } else { "" }
        );
        Ok(())
    }

    /// Hand a pinned relay back to automation.
    pub fn release(&mut self, name: &str) -> Result<(), ActuationError> {
        let index = self.index_of(name)?;
        if self.relays[index].manual {
            info!("Relay {} released to automation", name);
        }
        self.relays[index].manual = false;
        Ok(())
    }

    /// Write automation decisions, skipping pinned relays.
    ///
    /// A failed write leaves that relay's recorded state unchanged and does
    /// not stop the remaining writes. The failures are returned.
    pub async fn apply_automatic(&mut self, desired: &[(&str, bool)]) -> Vec<ActuationError> {
        let mut failures = Vec::new();

        for (name, on) in desired {
            let index = match self.index_of(name) {
                Ok(index) => index,
                Err(err) => {
                    failures.push(err);
                    continue;
                }
            };
            if self.relays[index].manual {
                debug!("Relay {} is held manually, automation skipped", name);
                continue;
            }

            match self.actuator.set_state(name, *on).await {
                Ok(()) => {
                    let relay = &mut self.relays[index];
                    if relay.state != *on {
                        info!("Relay {} -> {}", name, if *on { "ON" } else { "OFF" });
                    }
                    relay.state = *on;
                }
                Err(err) => {
                    warn!("Relay automation: {} write failed: {}", name, err);
                    failures.push(err);
                }
            }
        }

        failures
    }

    fn find(&self, name: &str) -> Option<&RelayDescriptor> {
        self.relays.iter().find(|relay| relay.name == name)
    }

    fn index_of(&self, name: &str) -> Result<usize, ActuationError> {
        self.relays
            .iter()
            .position(|relay| relay.name == name)
            .ok_or_else(|| ActuationError::UnknownRelay {
                name: name.to_string(),
            })
    }
}

/// Relay bank shared between the poll task and external readers.
pub type SharedRelayBank = Arc<Mutex<RelayBank>>;

pub fn create_shared_relay_bank(
    actuator: Box<dyn RelayActuator>,
    manual_override_hold: bool,
) -> SharedRelayBank {
    Arc::new(Mutex::new(RelayBank::new(actuator, manual_override_hold)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::relay::simulated::SimulatedRelayActuator;

    fn bank(hold: bool) -> RelayBank {
        let actuator = SimulatedRelayActuator::new(RelayConfig::default().pins);
        RelayBank::new(Box::new(actuator), hold)
    }

    #[test]
    fn test_all_relays_start_off() {
        let bank = bank(true);
        assert_eq!(bank.descriptors().len(), 8);
        assert!(bank.states().values().all(|on| !on));
        assert!(!bank.is_manual("fan"));
    }

    #[tokio::test]
    async fn test_manual_hold_blocks_automation_until_release() {
        let mut bank = bank(true);

        bank.set_manual("load1", false).await.unwrap();
        assert!(bank.is_manual("load1"));

        let failures = bank.apply_automatic(&[("load1", true), ("load2", true)]).await;
        assert!(failures.is_empty());
        assert_eq!(bank.state("load1"), Some(false));
        assert_eq!(bank.state("load2"), Some(true));

        bank.release("load1").unwrap();
        bank.apply_automatic(&[("load1", true)]).await;
        assert_eq!(bank.state("load1"), Some(true));
    }

    #[tokio::test]
    async fn test_without_hold_last_writer_wins() {
        let mut bank = bank(false);

        bank.set_manual("display", true).await.unwrap();
        assert!(!bank.is_manual("display"));

        bank.apply_automatic(&[("display", false)]).await;
        assert_eq!(bank.state("display"), Some(false));
    }

    #[tokio::test]
    async fn test_unknown_relay_rejected() {
        let mut bank = bank(true);
        assert_eq!(
            bank.set_manual("pump", true).await,
            Err(ActuationError::UnknownRelay {
                name: "pump".to_string()
            })
        );
        assert!(bank.release("pump").is_err());
    }
}
