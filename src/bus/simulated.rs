// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated field devices
//!
//! [`SimulatedDevices`] holds the register contents of the five devices the
//! gateway knows about, laid out exactly like the real hardware:
//!
//! | Slave | Device | Bank | Registers |
//! |-------|--------|------|-----------|
//! | 1 | LDR light sensor | holding | 0x0000-0x0001 lux (u32) |
//! | 2 | PIR motion sensor | holding | 0x0006 motion flag |
//! | 3 | MPPT charge controller | input | 0x3000 PV volts ×100, 0x3001 PV amps ×100 |
//! | 4 | Battery management | input | 0x3004 volts ×100, 0x3005 amps ×100, 0x3020 SoC, 0x3021 SoH, 0x3022 temp ×10, 0x3023 discharge min, 0x3024 charge min |
//! | 123 | Environmental sensor | holding | 0x0008.. six float32 pairs (CO2, PM2.5, PM10, temperature, humidity, illumination) |
//!
//! The same register model backs both [`SimulatedBus`] (in-process) and the
//! Modbus TCP simulator server in [`crate::modbus`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use log::debug;
use rand::Rng;
use tokio_modbus::ExceptionCode;

use super::{BusClient, RegisterBank};
use crate::decoder::{encode_float32, encode_u32};
use crate::error::ReadError;

pub const LDR_SLAVE: u8 = 1;
pub const PIR_SLAVE: u8 = 2;
pub const MPPT_SLAVE: u8 = 3;
pub const BMS_SLAVE: u8 = 4;
pub const ENV_SLAVE: u8 = 123;

/// Register contents of one slave.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegisters {
    pub holding: HashMap<u16, u16>,
    pub input: HashMap<u16, u16>,
}

impl DeviceRegisters {
    fn bank(&self, bank: RegisterBank) -> &HashMap<u16, u16> {
        match bank {
            RegisterBank::Holding => &self.holding,
            RegisterBank::Input => &self.input,
        }
    }

    fn bank_mut(&mut self, bank: RegisterBank) -> &mut HashMap<u16, u16> {
        match bank {
            RegisterBank::Holding => &mut self.holding,
            RegisterBank::Input => &mut self.input,
        }
    }
}

/// Register model of all simulated slaves.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevices {
    devices: HashMap<u8, DeviceRegisters>,
}

/// Register model shared between the simulated bus, the simulator server and
/// the refresh task.
pub type SharedDevices = Arc<Mutex<SimulatedDevices>>;

impl SimulatedDevices {
    /// Empty register model: every slave is absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// All five devices populated with random plausible values.
    pub fn randomized<R: Rng>(rng: &mut R) -> Self {
        let mut devices = Self::new();
        devices.refresh(rng);
        devices
    }

    /// Randomized model wrapped for sharing.
    pub fn shared_randomized() -> SharedDevices {
        Arc::new(Mutex::new(Self::randomized(&mut rand::rng())))
    }

    /// Draw new values for every device.
    pub fn refresh<R: Rng>(&mut self, rng: &mut R) {
        let lux = rng.random_range(5_000u32..=45_000);
        self.set_u32(LDR_SLAVE, RegisterBank::Holding, 0x0000, lux);

        let motion = rng.random_bool(0.5) as u16;
        self.set_word(PIR_SLAVE, RegisterBank::Holding, 0x0006, motion);

        let pv_voltage = (rng.random_range(15.0f64..20.0) * 100.0) as u16;
        let pv_current = (rng.random_range(2.0f64..8.0) * 100.0) as u16;
        self.set_word(MPPT_SLAVE, RegisterBank::Input, 0x3000, pv_voltage);
        self.set_word(MPPT_SLAVE, RegisterBank::Input, 0x3001, pv_current);

        let battery_voltage = (rng.random_range(11.5f64..13.0) * 100.0) as u16;
        let battery_current = (rng.random_range(0.5f64..5.0) * 100.0) as u16;
        let battery_temp = (rng.random_range(20.0f64..45.0) * 10.0) as u16;
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3004, battery_voltage);
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3005, battery_current);
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3020, rng.random_range(10..=100));
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3021, rng.random_range(80..=100));
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3022, battery_temp);
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3023, rng.random_range(30..=180));
        self.set_word(BMS_SLAVE, RegisterBank::Input, 0x3024, rng.random_range(15..=120));

        let env: [(u16, f32); 6] = [
            (0x0008, rng.random_range(400.0..1500.0)),  // CO2
            (0x000A, rng.random_range(5.0..80.0)),      // PM2.5
            (0x000C, rng.random_range(10.0..150.0)),    // PM10
            (0x000E, rng.random_range(5.0..35.0)),      // temperature
            (0x0010, rng.random_range(30.0..90.0)),     // humidity
            (0x0012, rng.random_range(1000.0..50000.0)), // illumination
        ];
        for (address, value) in env {
            self.set_float(ENV_SLAVE, RegisterBank::Holding, address, value);
        }

        debug!("Simulated devices refreshed (lux={}, motion={})", lux, motion);
    }

    pub fn set_word(&mut self, slave: u8, bank: RegisterBank, address: u16, value: u16) {
        self.devices
            .entry(slave)
            .or_default()
            .bank_mut(bank)
            .insert(address, value);
    }

    pub fn set_u32(&mut self, slave: u8, bank: RegisterBank, address: u16, value: u32) {
        let [hi, lo] = encode_u32(value);
        self.set_word(slave, bank, address, hi);
        self.set_word(slave, bank, address + 1, lo);
    }

    pub fn set_float(&mut self, slave: u8, bank: RegisterBank, address: u16, value: f32) {
        let [hi, lo] = encode_float32(value);
        self.set_word(slave, bank, address, hi);
        self.set_word(slave, bank, address + 1, lo);
    }

    /// Drop a single register so reads covering it fail.
    pub fn remove_word(&mut self, slave: u8, bank: RegisterBank, address: u16) {
        if let Some(device) = self.devices.get_mut(&slave) {
            device.bank_mut(bank).remove(&address);
        }
    }

    /// Drop a whole slave from the bus.
    pub fn remove_device(&mut self, slave: u8) {
        self.devices.remove(&slave);
    }

    pub fn has_device(&self, slave: u8) -> bool {
        self.devices.contains_key(&slave)
    }

    /// Read registers the way a slave would answer a read request.
    ///
    /// Returns `None` when the slave does not exist (no answer on the wire),
    /// and an IllegalDataAddress exception when any requested register is missing.
    pub fn read(
        &self,
        slave: u8,
        bank: RegisterBank,
        address: u16,
        count: u16,
    ) -> Option<Result<Vec<u16>, ExceptionCode>> {
        let registers = self.devices.get(&slave)?.bank(bank);
        Some(register_read(registers, address, count))
    }
}

/// Read `cnt` registers starting at `addr` from a register map.
pub fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    let mut response_values = vec![0; cnt.into()];
    for i in 0..cnt {
        let reg_addr = addr.checked_add(i).ok_or(ExceptionCode::IllegalDataAddress)?;
        match registers.get(&reg_addr) {
            Some(r) => response_values[i as usize] = *r,
            None => return Err(ExceptionCode::IllegalDataAddress),
        }
    }

    Ok(response_values)
}

/// In-process bus over a [`SharedDevices`] register model.
pub struct SimulatedBus {
    devices: SharedDevices,
    failing_slaves: HashSet<u8>,
    reads: usize,
}

impl SimulatedBus {
    pub fn new(devices: SharedDevices) -> Self {
        Self {
            devices,
            failing_slaves: HashSet::new(),
            reads: 0,
        }
    }

    /// Make every read addressed to `slave` fail with a transport error.
    pub fn fail_slave(&mut self, slave: u8) {
        self.failing_slaves.insert(slave);
    }

    pub fn restore_slave(&mut self, slave: u8) {
        self.failing_slaves.remove(&slave);
    }

    /// Number of requests that reached the bus.
    pub fn read_count(&self) -> usize {
        self.reads
    }

    pub fn devices(&self) -> SharedDevices {
        self.devices.clone()
    }
}

#[async_trait::async_trait]
impl BusClient for SimulatedBus {
    async fn read_registers(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> Result<Vec<u16>, ReadError> {
        self.reads += 1;

        if self.failing_slaves.contains(&slave) {
            return Err(ReadError::Transport {
                slave,
                address,
                bank,
                reason: "injected fault".to_string(),
            });
        }

        let devices = self.devices.lock().map_err(|_| ReadError::NotConnected {
            reason: "simulated register model poisoned".to_string(),
        })?;

        match devices.read(slave, bank, address, count) {
            None => Err(ReadError::Timeout {
                slave,
                address,
                bank,
                timeout_ms: 0,
            }),
            Some(Err(exception)) => Err(ReadError::Exception {
                slave,
                address,
                bank,
                exception: format!("{exception:?}"),
            }),
            Some(Ok(words)) => Ok(words),
        }
    }
}
