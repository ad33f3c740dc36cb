// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Composite classifiers derived from environmental readings

use std::fmt;

use serde::{Deserialize, Serialize};

/// Air quality index, 0 (best) to 4 (worst), from PM2.5 and CO2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirQuality {
    pub score: u8,
}

impl AirQuality {
    /// PM2.5 above 55 µg/m³ counts 2, above 35 counts 1.
    /// CO2 above 2000 ppm counts 2, above 1200 counts 1.
    pub fn from_readings(pm2_5: f64, co2: f64) -> Self {
        let pm_points = if pm2_5 > 55.0 {
            2
        } else if pm2_5 > 35.0 {
            1
        } else {
            0
        };
        let co2_points = if co2 > 2000.0 {
            2
        } else if co2 > 1200.0 {
            1
        } else {
            0
        };
        Self {
            score: pm_points + co2_points,
        }
    }

    pub fn label(&self) -> &'static str {
        self.level().0
    }

    /// Degradation percentage published as `air_quality_score`.
    pub fn percent(&self) -> u8 {
        self.level().1
    }

    fn level(&self) -> (&'static str, u8) {
        match self.score {
            0 => ("Excellent", 0),
            1 => ("Moderate", 25),
            2 => ("Low quality", 50),
            3 => ("Poor", 75),
            4 => ("Unhealthy", 100),
            _ => ("Unknown", 0),
        }
    }
}

/// Coarse weather guess from temperature, humidity and light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherStatus {
    #[serde(rename = "sunny/hot")]
    SunnyHot,
    #[serde(rename = "cold/rainy")]
    ColdRainy,
    #[serde(rename = "cool/partly cloudy")]
    CoolPartlyCloudy,
    #[serde(rename = "mild/humid")]
    MildHumid,
    #[serde(rename = "indeterminate")]
    Indeterminate,
}

impl WeatherStatus {
    /// First matching rule wins.
    pub fn classify(temperature: f64, humidity: f64, lux: f64) -> Self {
        if temperature > 25.0 && humidity < 50.0 && lux > 20_000.0 {
            WeatherStatus::SunnyHot
        } else if temperature < 10.0 && humidity > 70.0 && lux < 10_000.0 {
            WeatherStatus::ColdRainy
        } else if (10.0..=20.0).contains(&temperature)
            && (50.0..=70.0).contains(&humidity)
            && (10_000.0..=20_000.0).contains(&lux)
        {
            WeatherStatus::CoolPartlyCloudy
        } else if (15.0..=25.0).contains(&temperature) && humidity > 70.0 && lux < 15_000.0 {
            WeatherStatus::MildHumid
        } else {
            WeatherStatus::Indeterminate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherStatus::SunnyHot => "sunny/hot",
            WeatherStatus::ColdRainy => "cold/rainy",
            WeatherStatus::CoolPartlyCloudy => "cool/partly cloudy",
            WeatherStatus::MildHumid => "mild/humid",
            WeatherStatus::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for WeatherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charge controller state derived from PV current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MpptStatus {
    Charging,
    Idle,
}

impl MpptStatus {
    pub fn from_current(pv_current: f64) -> Self {
        if pv_current > 0.1 {
            MpptStatus::Charging
        } else {
            MpptStatus::Idle
        }
    }
}
