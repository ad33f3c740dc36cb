// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! One polling cycle over the field devices
//!
//! The cycle visits each device in a fixed order. Steps are independent: a
//! failed read only removes the fields it would have produced, the remaining
//! steps still run. All reads go through the [`SensorCache`] and are issued
//! one after the other on the single bus handle owned by the pipeline.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};

use super::cache::SensorCache;
use super::classify::{AirQuality, MpptStatus, WeatherStatus};
use super::snapshot::Snapshot;
use crate::bus::simulated::{BMS_SLAVE, ENV_SLAVE, LDR_SLAVE, MPPT_SLAVE, PIR_SLAVE};
use crate::bus::{BusClient, RawRegisterBlock, RegisterKey};
use crate::decoder::{decode_bool, decode_float32, decode_scaled_int, decode_u32, round2};
use crate::error::{ReadError, SensorError};

/// Below this many lux the site is considered dark.
pub const DARK_LUX_THRESHOLD: u32 = 20_000;

/// Below this state of charge (percent) the BMS asks for load shedding.
pub const LOW_POWER_SOC: u16 = 30;

const LDR_LUX: RegisterKey = RegisterKey::holding(LDR_SLAVE, 0x0000, 2);
const PIR_MOTION: RegisterKey = RegisterKey::holding(PIR_SLAVE, 0x0006, 1);

const ENV_CO2: RegisterKey = RegisterKey::holding(ENV_SLAVE, 0x0008, 2);
const ENV_PM2_5: RegisterKey = RegisterKey::holding(ENV_SLAVE, 0x000A, 2);
const ENV_PM10: RegisterKey = RegisterKey::holding(ENV_SLAVE, 0x000C, 2);
const ENV_TEMPERATURE: RegisterKey = RegisterKey::holding(ENV_SLAVE, 0x000E, 2);
const ENV_HUMIDITY: RegisterKey = RegisterKey::holding(ENV_SLAVE, 0x0010, 2);
const ENV_ILLUMINATION: RegisterKey = RegisterKey::holding(ENV_SLAVE, 0x0012, 2);

const MPPT_PV_VOLTAGE: RegisterKey = RegisterKey::input(MPPT_SLAVE, 0x3000, 1);
const MPPT_PV_CURRENT: RegisterKey = RegisterKey::input(MPPT_SLAVE, 0x3001, 1);

const BMS_VOLTAGE: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3004, 1);
const BMS_CURRENT: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3005, 1);
const BMS_SOC: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3020, 1);
const BMS_SOH: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3021, 1);
const BMS_TEMPERATURE: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3022, 1);
const BMS_DISCHARGE_TIME: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3023, 1);
const BMS_CHARGE_TIME: RegisterKey = RegisterKey::input(BMS_SLAVE, 0x3024, 1);

/// Per-device stages of a cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStep {
    Ldr,
    Environment,
    Mppt,
    Pir,
    Bms,
}

impl DeviceStep {
    pub const ALL: [DeviceStep; 5] = [
        DeviceStep::Ldr,
        DeviceStep::Environment,
        DeviceStep::Mppt,
        DeviceStep::Pir,
        DeviceStep::Bms,
    ];
}

impl fmt::Display for DeviceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStep::Ldr => "ldr",
            DeviceStep::Environment => "environment",
            DeviceStep::Mppt => "mppt",
            DeviceStep::Pir => "pir",
            DeviceStep::Bms => "bms",
        };
        f.write_str(name)
    }
}

/// Reads every field device and assembles a [`Snapshot`].
pub struct AcquisitionPipeline<B> {
    bus: B,
    cache: SensorCache,
    // Bus requests issued during the current cycle, and how many of them
    // failed at the transport level.
    bus_reads: usize,
    link_failures: usize,
}

impl<B: BusClient + Send> AcquisitionPipeline<B> {
    pub fn new(bus: B, cache_ttl: Duration) -> Self {
        Self {
            bus,
            cache: SensorCache::new(cache_ttl),
            bus_reads: 0,
            link_failures: 0,
        }
    }

    /// True when the last cycle reached the bus and every request failed at
    /// the transport level, i.e. the link itself is gone rather than a device.
    pub fn link_lost(&self) -> bool {
        self.bus_reads > 0 && self.link_failures == self.bus_reads
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn cache_mut(&mut self) -> &mut SensorCache {
        &mut self.cache
    }

    /// Run a full cycle that cannot be interrupted.
    pub async fn poll(&mut self) -> Snapshot {
        let running = AtomicBool::new(true);
        self.run_cycle(&running).await
    }

    /// Run one cycle.
    ///
    /// `running` is checked before each device step; once it is cleared the
    /// remaining steps are skipped and the partial snapshot is returned.
    pub async fn run_cycle(&mut self, running: &AtomicBool) -> Snapshot {
        let mut snapshot = Snapshot::empty();
        self.bus_reads = 0;
        self.link_failures = 0;

        for step in DeviceStep::ALL {
            if !running.load(Ordering::SeqCst) {
                warn!("Acquisition cycle abandoned before the {} step", step);
                break;
            }
            debug!("Acquisition step: {}", step);
            match step {
                DeviceStep::Ldr => self.poll_ldr(&mut snapshot).await,
                DeviceStep::Environment => self.poll_environment(&mut snapshot).await,
                DeviceStep::Mppt => self.poll_mppt(&mut snapshot).await,
                DeviceStep::Pir => self.poll_pir(&mut snapshot).await,
                DeviceStep::Bms => self.poll_bms(&mut snapshot).await,
            }
        }

        snapshot.created_at = Utc::now();
        snapshot
    }

    async fn poll_ldr(&mut self, snapshot: &mut Snapshot) {
        match self.read_pair(LDR_LUX).await {
            Ok(words) => {
                let lux = decode_u32(words);
                snapshot.ldr_lux = Some(lux);
                snapshot.is_dark = Some(lux < DARK_LUX_THRESHOLD);
            }
            Err(err) => report("ldr_lux", &err),
        }
    }

    async fn poll_environment(&mut self, snapshot: &mut Snapshot) {
        let co2 = self.read_float("co2", ENV_CO2).await;
        let pm2_5 = self.read_float("pm2_5", ENV_PM2_5).await;
        let pm10 = self.read_float("pm10", ENV_PM10).await;
        let temperature = self.read_float("temperature", ENV_TEMPERATURE).await;
        let humidity = self.read_float("humidity", ENV_HUMIDITY).await;
        let illumination = self.read_float("illumination", ENV_ILLUMINATION).await;

        snapshot.co2 = co2;
        snapshot.pm2_5 = pm2_5;
        snapshot.pm10 = pm10;
        snapshot.temperature = temperature;
        snapshot.humidity = humidity;
        snapshot.illumination = illumination;

        let (Some(co2), Some(pm2_5), Some(_), Some(temperature), Some(humidity), Some(_)) =
            (co2, pm2_5, pm10, temperature, humidity, illumination)
        else {
            debug!("Environmental read incomplete, composites skipped");
            return;
        };

        let quality = AirQuality::from_readings(pm2_5, co2);
        snapshot.air_quality = Some(quality.label().to_string());
        snapshot.air_quality_score = Some(quality.percent());
        snapshot.air_quality_index = Some(quality.score);

        // No LDR reading counts as no light.
        let lux = snapshot.ldr_lux.map_or(0.0, f64::from);
        snapshot.weather_status = Some(WeatherStatus::classify(temperature, humidity, lux));
    }

    async fn poll_mppt(&mut self, snapshot: &mut Snapshot) {
        let voltage = self.read_scaled("pv_voltage", MPPT_PV_VOLTAGE, 100.0).await;
        let current = self.read_scaled("pv_current", MPPT_PV_CURRENT, 100.0).await;

        snapshot.pv_voltage = voltage;
        snapshot.pv_current = current;
        if let (Some(voltage), Some(current)) = (voltage, current) {
            snapshot.pv_power = Some(round2(voltage * current));
        }
        snapshot.mppt_status = current.map(MpptStatus::from_current);
    }

    async fn poll_pir(&mut self, snapshot: &mut Snapshot) {
        match self.read_word(PIR_MOTION).await {
            Ok(word) => {
                let motion = decode_bool(word);
                snapshot.motion_detected = Some(motion);
                snapshot.display_should_be_on = Some(motion);
            }
            Err(err) => report("motion_detected", &err),
        }
    }

    async fn poll_bms(&mut self, snapshot: &mut Snapshot) {
        let voltage = self.read_scaled("battery_voltage", BMS_VOLTAGE, 100.0).await;
        let current = self.read_scaled("battery_current", BMS_CURRENT, 100.0).await;
        let soc = self.read_raw("battery_soc", BMS_SOC).await;
        let soh = self.read_raw("battery_soh", BMS_SOH).await;
        let temperature = self.read_scaled("battery_temp", BMS_TEMPERATURE, 10.0).await;
        let discharge_time = self.read_raw("discharge_time", BMS_DISCHARGE_TIME).await;
        let charge_time = self.read_raw("charge_time", BMS_CHARGE_TIME).await;

        snapshot.battery_voltage = voltage;
        snapshot.battery_current = current;
        snapshot.battery_soc = soc;
        snapshot.battery_soh = soh;
        snapshot.battery_temp = temperature;
        snapshot.discharge_time = discharge_time;
        snapshot.charge_time = charge_time;

        if let (Some(voltage), Some(current)) = (voltage, current) {
            snapshot.battery_power = Some(round2(voltage * current));
        }
        snapshot.bms_low_power_mode = soc.map(|soc| soc < LOW_POWER_SOC);
    }

    async fn read_float(&mut self, field: &str, key: RegisterKey) -> Option<f64> {
        match self.read_pair(key).await {
            Ok(words) => {
                let value = decode_float32(words);
                if value.is_finite() {
                    Some(round2(f64::from(value)))
                } else {
                    warn!(
                        "Acquisition: {} decoded to non-finite value {} from {:04X?}, dropped",
                        field, value, words
                    );
                    None
                }
            }
            Err(err) => {
                report(field, &err);
                None
            }
        }
    }

    async fn read_scaled(&mut self, field: &str, key: RegisterKey, scale: f64) -> Option<f64> {
        match self.read_word(key).await {
            Ok(word) => Some(round2(decode_scaled_int(word, scale))),
            Err(err) => {
                report(field, &err);
                None
            }
        }
    }

    async fn read_raw(&mut self, field: &str, key: RegisterKey) -> Option<u16> {
        match self.read_word(key).await {
            Ok(word) => Some(word),
            Err(err) => {
                report(field, &err);
                None
            }
        }
    }

    async fn read_word(&mut self, key: RegisterKey) -> Result<u16, SensorError> {
        Ok(self.read_block(key).await?.word()?)
    }

    async fn read_pair(&mut self, key: RegisterKey) -> Result<[u16; 2], SensorError> {
        Ok(self.read_block(key).await?.pair()?)
    }

    /// Cached read, falling back to the bus on a miss.
    async fn read_block(&mut self, key: RegisterKey) -> Result<RawRegisterBlock, ReadError> {
        if let Some(block) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            return Ok(block);
        }

        let result = self
            .bus
            .read_registers(key.slave, key.address, key.count, key.bank)
            .await;
        self.bus_reads += 1;
        let words = match result {
            Ok(words) => words,
            Err(err) => {
                if err.is_link_failure() {
                    self.link_failures += 1;
                }
                return Err(err);
            }
        };
        let block = RawRegisterBlock::new(key, words);
        if block.words.len() == usize::from(key.count) {
            self.cache.put(key, block.clone());
        }
        Ok(block)
    }
}

fn report(field: &str, err: &SensorError) {
    warn!("Acquisition: {} unavailable this cycle: {}", field, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::simulated::{SharedDevices, SimulatedBus, SimulatedDevices};
    use crate::bus::RegisterBank;
    use std::sync::{Arc, Mutex};

    fn field_devices() -> SharedDevices {
        let mut devices = SimulatedDevices::new();
        devices.set_u32(LDR_SLAVE, RegisterBank::Holding, 0x0000, 12_000);
        devices.set_word(PIR_SLAVE, RegisterBank::Holding, 0x0006, 1);
        devices.set_word(MPPT_SLAVE, RegisterBank::Input, 0x3000, 1850);
        devices.set_word(MPPT_SLAVE, RegisterBank::Input, 0x3001, 420);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3004, 1260);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3005, 150);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3020, 25);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3021, 97);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3022, 315);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3023, 120);
        devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3024, 45);
        for (address, value) in [
            (0x0008, 1300.0f32),
            (0x000A, 40.0),
            (0x000C, 60.0),
            (0x000E, 15.5),
            (0x0010, 60.0),
            (0x0012, 14_000.0),
        ] {
            devices.set_float(ENV_SLAVE, RegisterBank::Holding, address, value);
        }
        Arc::new(Mutex::new(devices))
    }

    fn pipeline(devices: SharedDevices) -> AcquisitionPipeline<SimulatedBus> {
        AcquisitionPipeline::new(SimulatedBus::new(devices), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_full_cycle_decodes_every_device() {
        let mut pipeline = pipeline(field_devices());
        let snapshot = pipeline.poll().await;

        assert_eq!(snapshot.ldr_lux, Some(12_000));
        assert_eq!(snapshot.is_dark, Some(true));

        assert_eq!(snapshot.co2, Some(1300.0));
        assert_eq!(snapshot.temperature, Some(15.5));
        assert_eq!(snapshot.air_quality.as_deref(), Some("Low quality"));
        assert_eq!(snapshot.air_quality_score, Some(50));
        assert_eq!(snapshot.air_quality_index, Some(2));
        assert_eq!(
            snapshot.weather_status,
            Some(WeatherStatus::CoolPartlyCloudy)
        );

        assert_eq!(snapshot.pv_voltage, Some(18.5));
        assert_eq!(snapshot.pv_current, Some(4.2));
        assert_eq!(snapshot.pv_power, Some(77.7));
        assert_eq!(snapshot.mppt_status, Some(MpptStatus::Charging));

        assert_eq!(snapshot.motion_detected, Some(true));
        assert_eq!(snapshot.display_should_be_on, Some(true));

        assert_eq!(snapshot.battery_voltage, Some(12.6));
        assert_eq!(snapshot.battery_current, Some(1.5));
        assert_eq!(snapshot.battery_power, Some(18.9));
        assert_eq!(snapshot.battery_soc, Some(25));
        assert_eq!(snapshot.battery_soh, Some(97));
        assert_eq!(snapshot.battery_temp, Some(31.5));
        assert_eq!(snapshot.discharge_time, Some(120));
        assert_eq!(snapshot.charge_time, Some(45));
        assert_eq!(snapshot.bms_low_power_mode, Some(true));

        assert_eq!(snapshot.keys().len(), 26);
    }

    #[tokio::test]
    async fn test_failed_device_does_not_affect_others() {
        let mut pipeline = pipeline(field_devices());
        pipeline.bus_mut().fail_slave(ENV_SLAVE);

        let snapshot = pipeline.poll().await;

        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.co2, None);
        assert_eq!(snapshot.air_quality, None);
        assert_eq!(snapshot.weather_status, None);
        assert_eq!(snapshot.ldr_lux, Some(12_000));
        assert_eq!(snapshot.motion_detected, Some(true));
        assert_eq!(snapshot.battery_soc, Some(25));
    }

    #[tokio::test]
    async fn test_partial_environment_skips_composites() {
        let devices = field_devices();
        devices
            .lock()
            .unwrap()
            .remove_word(ENV_SLAVE, RegisterBank::Holding, 0x0011);
        let mut pipeline = pipeline(devices);

        let snapshot = pipeline.poll().await;

        assert_eq!(snapshot.humidity, None);
        assert_eq!(snapshot.temperature, Some(15.5));
        assert_eq!(snapshot.pm2_5, Some(40.0));
        assert_eq!(snapshot.air_quality, None);
        assert_eq!(snapshot.air_quality_score, None);
        assert_eq!(snapshot.weather_status, None);
    }

    #[tokio::test]
    async fn test_missing_soc_leaves_low_power_unknown() {
        let devices = field_devices();
        devices
            .lock()
            .unwrap()
            .remove_word(BMS_SLAVE, RegisterBank::Input, 0x3020);
        devices
            .lock()
            .unwrap()
            .remove_word(BMS_SLAVE, RegisterBank::Input, 0x3005);
        let mut pipeline = pipeline(devices);

        let snapshot = pipeline.poll().await;

        assert_eq!(snapshot.battery_soc, None);
        assert_eq!(snapshot.bms_low_power_mode, None);
        assert!(!snapshot.keys().contains(&"bms_low_power_mode".to_string()));
        assert_eq!(snapshot.battery_voltage, Some(12.6));
        assert_eq!(snapshot.battery_current, None);
        assert_eq!(snapshot.battery_power, None);
        assert_eq!(snapshot.battery_soh, Some(97));
    }

    #[tokio::test]
    async fn test_offline_bms_adds_no_battery_keys() {
        let mut pipeline = pipeline(field_devices());
        pipeline.bus_mut().fail_slave(BMS_SLAVE);

        let snapshot = pipeline.poll().await;

        assert!(snapshot.keys().iter().all(|key| {
            !key.starts_with("battery") && key != "bms_low_power_mode"
        }));
        assert_eq!(snapshot.motion_detected, Some(true));
    }

    #[tokio::test]
    async fn test_weather_without_ldr_assumes_no_light() {
        let devices = field_devices();
        {
            let mut devices = devices.lock().unwrap();
            // Sunny values on the environmental sensor, bright illumination
            devices.set_float(ENV_SLAVE, RegisterBank::Holding, 0x000E, 30.0);
            devices.set_float(ENV_SLAVE, RegisterBank::Holding, 0x0010, 40.0);
            devices.set_float(ENV_SLAVE, RegisterBank::Holding, 0x0012, 45_000.0);
        }
        let mut pipeline = pipeline(devices.clone());
        pipeline.bus_mut().fail_slave(LDR_SLAVE);

        let snapshot = pipeline.poll().await;
        assert_eq!(snapshot.ldr_lux, None);
        assert_eq!(snapshot.illumination, Some(45_000.0));
        assert_eq!(snapshot.weather_status, Some(WeatherStatus::Indeterminate));

        // The same site with a bright LDR reading is sunny
        devices
            .lock()
            .unwrap()
            .set_u32(LDR_SLAVE, RegisterBank::Holding, 0x0000, 40_000);
        pipeline.bus_mut().restore_slave(LDR_SLAVE);
        pipeline.cache_mut().clear();
        assert_eq!(
            pipeline.poll().await.weather_status,
            Some(WeatherStatus::SunnyHot)
        );
    }

    #[tokio::test]
    async fn test_non_finite_float_is_dropped() {
        let devices = field_devices();
        {
            let mut devices = devices.lock().unwrap();
            devices.set_word(ENV_SLAVE, RegisterBank::Holding, 0x000E, 0x7FC0);
            devices.set_word(ENV_SLAVE, RegisterBank::Holding, 0x000F, 0x0000);
            devices.set_word(ENV_SLAVE, RegisterBank::Holding, 0x0010, 0x7F80);
            devices.set_word(ENV_SLAVE, RegisterBank::Holding, 0x0011, 0x0000);
        }
        let mut pipeline = pipeline(devices);

        let snapshot = pipeline.poll().await;

        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.humidity, None);
        assert!(!snapshot.to_map().contains_key("temperature"));
        assert_eq!(snapshot.co2, Some(1300.0));
        assert_eq!(snapshot.weather_status, None);
    }

    #[tokio::test]
    async fn test_link_lost_only_when_every_request_fails_in_transport() {
        let mut pipeline = pipeline(field_devices());
        for slave in [LDR_SLAVE, PIR_SLAVE, MPPT_SLAVE, BMS_SLAVE, ENV_SLAVE] {
            pipeline.bus_mut().fail_slave(slave);
        }
        assert!(pipeline.poll().await.is_empty());
        assert!(pipeline.link_lost());

        // One answering device means the link is up
        pipeline.bus_mut().restore_slave(PIR_SLAVE);
        pipeline.poll().await;
        assert!(!pipeline.link_lost());

        // Silent devices time out, which is not a link failure
        let mut silent = AcquisitionPipeline::new(
            SimulatedBus::new(Arc::new(Mutex::new(SimulatedDevices::new()))),
            Duration::from_secs(5),
        );
        assert!(silent.poll().await.is_empty());
        assert!(!silent.link_lost());
    }

    #[tokio::test]
    async fn test_cache_avoids_second_bus_read() {
        let mut pipeline = pipeline(field_devices());

        pipeline.poll().await;
        let reads_after_first = pipeline.bus().read_count();
        assert_eq!(reads_after_first, 17);

        pipeline.poll().await;
        assert_eq!(pipeline.bus().read_count(), reads_after_first);

        pipeline.cache_mut().clear();
        pipeline.poll().await;
        assert_eq!(pipeline.bus().read_count(), 2 * reads_after_first);
    }

    #[tokio::test]
    async fn test_failed_reads_are_not_cached() {
        let mut pipeline = pipeline(field_devices());
        pipeline.bus_mut().fail_slave(PIR_SLAVE);
        assert_eq!(pipeline.poll().await.motion_detected, None);

        pipeline.bus_mut().restore_slave(PIR_SLAVE);
        assert_eq!(pipeline.poll().await.motion_detected, Some(true));
    }

    #[tokio::test]
    async fn test_abandoned_cycle_yields_partial_snapshot() {
        let mut pipeline = pipeline(field_devices());
        let running = AtomicBool::new(false);

        let snapshot = pipeline.run_cycle(&running).await;

        assert!(snapshot.is_empty());
        assert_eq!(pipeline.bus().read_count(), 0);
    }
}
