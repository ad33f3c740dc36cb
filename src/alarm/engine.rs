// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Threshold evaluation

use log::{error, info, warn};

use super::state::AlarmState;
use super::{Alarm, AlarmLevel};
use crate::acquisition::Snapshot;
use crate::config::AlarmConfig;

/// Fixed PM2.5 limit (µg/m³), the "unhealthy" air quality boundary.
pub const PM2_5_ALARM_HIGH: f64 = 55.0;

/// Evaluates snapshots against the alarm thresholds.
#[derive(Debug, Clone)]
pub struct AlarmEngine {
    config: AlarmConfig,
}

impl AlarmEngine {
    pub fn new(config: AlarmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    /// Check `snapshot` and record every alarm that fires into `state`.
    ///
    /// Missing measurements are skipped. Returns the alarms raised this
    /// cycle, including those that were already active.
    pub fn evaluate(&self, snapshot: &Snapshot, state: &mut AlarmState) -> Vec<Alarm> {
        if !self.config.enabled {
            return Vec::new();
        }

        let fired = self.check(snapshot);
        for alarm in &fired {
            log_alarm(alarm);
            state.record(alarm.clone());
        }
        fired
    }

    fn check(&self, snapshot: &Snapshot) -> Vec<Alarm> {
        let cfg = &self.config;
        let mut fired = Vec::new();

        if let Some(temp) = snapshot.temperature {
            if temp > cfg.temp_alarm_high {
                fired.push(Alarm::new(
                    AlarmLevel::Warning,
                    "temperature",
                    temp,
                    cfg.temp_alarm_high,
                    format!(
                        "High temperature: {}°C (threshold: {}°C)",
                        temp, cfg.temp_alarm_high
                    ),
                ));
            } else if temp < cfg.temp_alarm_low {
                fired.push(Alarm::new(
                    AlarmLevel::Warning,
                    "temperature",
                    temp,
                    cfg.temp_alarm_low,
                    format!(
                        "Low temperature: {}°C (threshold: {}°C)",
                        temp, cfg.temp_alarm_low
                    ),
                ));
            }
        }

        if let Some(humidity) = snapshot.humidity {
            if humidity > cfg.humidity_alarm_high {
                fired.push(Alarm::new(
                    AlarmLevel::Warning,
                    "humidity",
                    humidity,
                    cfg.humidity_alarm_high,
                    format!(
                        "High humidity: {}% (threshold: {}%)",
                        humidity, cfg.humidity_alarm_high
                    ),
                ));
            }
        }

        if let Some(co2) = snapshot.co2 {
            if co2 > cfg.co2_alarm_high {
                fired.push(Alarm::new(
                    AlarmLevel::Critical,
                    "co2",
                    co2,
                    cfg.co2_alarm_high,
                    format!(
                        "High CO2 level: {} ppm (threshold: {} ppm)",
                        co2, cfg.co2_alarm_high
                    ),
                ));
            }
        }

        if let Some(soc) = snapshot.battery_soc {
            if soc < cfg.battery_soc_alarm_low {
                fired.push(Alarm::new(
                    AlarmLevel::Critical,
                    "battery_soc",
                    f64::from(soc),
                    f64::from(cfg.battery_soc_alarm_low),
                    format!(
                        "Low battery: {}% (threshold: {}%)",
                        soc, cfg.battery_soc_alarm_low
                    ),
                ));
            }
        }

        if let Some(pm2_5) = snapshot.pm2_5 {
            if pm2_5 > PM2_5_ALARM_HIGH {
                fired.push(Alarm::new(
                    AlarmLevel::Warning,
                    "pm2_5",
                    pm2_5,
                    PM2_5_ALARM_HIGH,
                    format!("High particulate level (PM2.5): {} µg/m³", pm2_5),
                ));
            }
        }

        fired
    }
}

fn log_alarm(alarm: &Alarm) {
    match alarm.level {
        AlarmLevel::Critical => error!("[ALARM {}] {}", alarm.level, alarm.message),
        AlarmLevel::Warning => warn!("[ALARM {}] {}", alarm.level, alarm.message),
        AlarmLevel::Info => info!("[ALARM {}] {}", alarm.level, alarm.message),
    }
}
