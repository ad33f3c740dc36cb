// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Alarm threshold configuration

use serde::{Deserialize, Serialize};

/// Thresholds evaluated against every snapshot.
///
/// The PM2.5 threshold is fixed at 55 µg/m³ and is not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Master switch; when false no alarm is raised and the alarm state is left untouched.
    pub enabled: bool,
    /// °C
    pub temp_alarm_high: f64,
    /// °C
    pub temp_alarm_low: f64,
    /// %RH
    pub humidity_alarm_high: f64,
    /// ppm
    pub co2_alarm_high: f64,
    /// %
    pub battery_soc_alarm_low: u16,
    /// Number of alarms kept in the history.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize {
    100
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temp_alarm_high: 35.0,
            temp_alarm_low: 5.0,
            humidity_alarm_high: 85.0,
            co2_alarm_high: 2000.0,
            battery_soc_alarm_low: 20,
            max_history: default_max_history(),
        }
    }
}
