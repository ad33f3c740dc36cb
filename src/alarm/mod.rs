// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Threshold alarms
//!
//! The [`AlarmEngine`] checks every snapshot against the configured limits
//! and records what fired in an [`AlarmState`]. The state keeps one active
//! alarm per (sensor, level) pair and a bounded history of every alarm raised.

pub mod engine;
pub mod state;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use engine::{AlarmEngine, PM2_5_ALARM_HIGH};
pub use state::{create_shared_alarm_state, AlarmState, SharedAlarmState, MAX_HISTORY_SIZE};

/// Alarm severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmLevel::Info => write!(f, "INFO"),
            AlarmLevel::Warning => write!(f, "WARNING"),
            AlarmLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One threshold breach. Serializes to the exported alarm record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub level: AlarmLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub sensor: String,
    pub value: f64,
    pub threshold: f64,
}

impl Alarm {
    pub fn new(
        level: AlarmLevel,
        sensor: &str,
        value: f64,
        threshold: f64,
        message: String,
    ) -> Self {
        Self {
            level,
            message,
            timestamp: Utc::now(),
            sensor: sensor.to_string(),
            value,
            threshold,
        }
    }

    /// Whether `other` occupies the same active slot as this alarm.
    pub fn same_slot(&self, other: &Alarm) -> bool {
        self.sensor == other.sensor && self.level == other.level
    }
}
