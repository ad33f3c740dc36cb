// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Result of one polling cycle
//!
//! Every measurement is optional: `None` means the sensor did not deliver a
//! value this cycle. Absent fields are left out of the exported JSON object
//! instead of being written as `null` or zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classify::{MpptStatus, WeatherStatus};

/// Measurements gathered during one cycle, stamped with the cycle's
/// completion time.
///
/// A snapshot is built by the acquisition pipeline and then shared read-only
/// (usually as `Arc<Snapshot>`); a new cycle always produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,

    // Light sensor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldr_lux: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dark: Option<bool>,

    // Environmental sensor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm2_5: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illumination: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<String>,
    /// Degradation percentage (0, 25, 50, 75 or 100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_quality_score: Option<u8>,
    /// Raw 0-4 index behind `air_quality`, kept for local consumers.
    #[serde(skip)]
    pub air_quality_index: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_status: Option<WeatherStatus>,

    // MPPT charge controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mppt_status: Option<MpptStatus>,

    // PIR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_should_be_on: Option<bool>,

    // Battery management system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_soc: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_soh: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_temp: Option<f64>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_time: Option<u16>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bms_low_power_mode: Option<bool>,
}

impl Snapshot {
    /// Snapshot with no measurement at all.
    pub fn empty() -> Self {
        Self {
            created_at: Utc::now(),
            ldr_lux: None,
            is_dark: None,
            co2: None,
            temperature: None,
            humidity: None,
            pm2_5: None,
            pm10: None,
            illumination: None,
            air_quality: None,
            air_quality_score: None,
            air_quality_index: None,
            weather_status: None,
            pv_voltage: None,
            pv_current: None,
            pv_power: None,
            mppt_status: None,
            motion_detected: None,
            display_should_be_on: None,
            battery_voltage: None,
            battery_current: None,
            battery_power: None,
            battery_soc: None,
            battery_soh: None,
            battery_temp: None,
            discharge_time: None,
            charge_time: None,
            bms_low_power_mode: None,
        }
    }

    /// Exported key/value map, without the timestamp.
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("timestamp");
                map
            }
            _ => serde_json::Map::new(),
        }
    }

    /// Names of the measurements present in this snapshot.
    pub fn keys(&self) -> Vec<String> {
        self.to_map().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_map().is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_not_exported() {
        let snapshot = Snapshot {
            temperature: Some(21.5),
            motion_detected: Some(false),
            ..Snapshot::empty()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 3);
        assert!(object.contains_key("timestamp"));
        assert_eq!(object["temperature"], 21.5);
        assert_eq!(object["motion_detected"], false);
        assert_eq!(snapshot.keys(), vec!["motion_detected", "temperature"]);
    }

    #[test]
    fn test_derived_values_export_format() {
        let snapshot = Snapshot {
            air_quality: Some("Poor".to_string()),
            air_quality_score: Some(75),
            air_quality_index: Some(3),
            weather_status: Some(WeatherStatus::CoolPartlyCloudy),
            mppt_status: Some(MpptStatus::Charging),
            ..Snapshot::empty()
        };
        let map = snapshot.to_map();
        assert_eq!(map["air_quality"], "Poor");
        assert_eq!(map["air_quality_score"], 75);
        assert_eq!(map["weather_status"], "cool/partly cloudy");
        assert_eq!(map["mppt_status"], "Charging");
        assert!(!map.contains_key("air_quality_index"));
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(Snapshot::empty().is_empty());
        assert!(Snapshot::empty().keys().is_empty());
    }
}
