// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Gateway cycle and shared gateway state
//!
//! [`GatewayCycle`] chains one acquisition with alarm evaluation and relay
//! automation, then publishes the snapshot. [`GatewayHandle`] is the
//! cloneable view external collaborators (dashboard, broker bridge) use to
//! read the latest results and issue operator commands.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::RwLock;

use crate::acquisition::{
    AcquisitionPipeline, JsonFileSink, JsonLinesSink, Snapshot, SnapshotSink,
};
use crate::alarm::{create_shared_alarm_state, Alarm, AlarmEngine, SharedAlarmState};
use crate::bus::BusClient;
use crate::config::Config;
use crate::error::ActuationError;
use crate::relay::{
    create_shared_relay_bank, RelayActuator, RelayAutomationPolicy, RelayDescriptor,
    SharedRelayBank,
};

/// Shared gateway state: latest snapshot, alarms and relays.
///
/// Each part sits behind its own lock; the poll task takes each lock once
/// per cycle.
#[derive(Clone)]
pub struct GatewayHandle {
    latest: Arc<RwLock<Option<Arc<Snapshot>>>>,
    alarms: SharedAlarmState,
    relays: SharedRelayBank,
}

impl GatewayHandle {
    pub fn new(alarms: SharedAlarmState, relays: SharedRelayBank) -> Self {
        Self {
            latest: Arc::new(RwLock::new(None)),
            alarms,
            relays,
        }
    }

    /// Fresh state around `actuator`, sized from the configuration.
    pub fn from_config(config: &Config, actuator: Box<dyn RelayActuator>) -> Self {
        Self::new(
            create_shared_alarm_state(config.alarms.max_history),
            create_shared_relay_bank(actuator, config.relays.manual_override_hold),
        )
    }

    pub fn alarms(&self) -> SharedAlarmState {
        self.alarms.clone()
    }

    pub fn relays(&self) -> SharedRelayBank {
        self.relays.clone()
    }

    /// Snapshot of the last completed cycle.
    pub async fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().await.clone()
    }

    pub(crate) async fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.latest.write().await = Some(snapshot);
    }

    pub async fn active_alarms(&self) -> Vec<Alarm> {
        self.alarms.read().await.active().to_vec()
    }

    pub async fn alarm_history(&self, limit: Option<usize>) -> Vec<Alarm> {
        self.alarms.read().await.history(limit)
    }

    /// Clear active alarms for `sensor`, or all. Returns how many were removed.
    pub async fn clear_alarms(&self, sensor: Option<&str>) -> usize {
        let cleared = self.alarms.write().await.clear(sensor);
        info!(
            "Cleared {} active alarm(s) for {}",
            cleared,
            sensor.unwrap_or("all sensors")
        );
        cleared
    }

    pub async fn relay_states(&self) -> Vec<RelayDescriptor> {
        self.relays.lock().await.descriptors().to_vec()
    }

    pub async fn set_relay_manual(&self, name: &str, on: bool) -> Result<(), ActuationError> {
        self.relays.lock().await.set_manual(name, on).await
    }

    pub async fn release_relay(&self, name: &str) -> Result<(), ActuationError> {
        self.relays.lock().await.release(name)
    }
}

/// Outcome of one [`GatewayCycle::run_once`].
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: Arc<Snapshot>,
    pub alarms: Vec<Alarm>,
    pub actuation_failures: Vec<ActuationError>,
    /// Every bus request of the cycle failed at the transport level.
    pub link_lost: bool,
}

/// Acquisition, alarms, automation and publication for one bus.
pub struct GatewayCycle<B> {
    pipeline: AcquisitionPipeline<B>,
    alarm_engine: AlarmEngine,
    policy: RelayAutomationPolicy,
    handle: GatewayHandle,
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl<B: BusClient + Send> GatewayCycle<B> {
    pub fn new(
        pipeline: AcquisitionPipeline<B>,
        alarm_engine: AlarmEngine,
        handle: GatewayHandle,
    ) -> Self {
        Self {
            pipeline,
            alarm_engine,
            policy: RelayAutomationPolicy::new(),
            handle,
            sinks: Vec::new(),
        }
    }

    /// Cycle over `bus` configured from `config`, with the configured sinks.
    pub fn from_config(config: &Config, bus: B, handle: GatewayHandle) -> Self {
        let pipeline = AcquisitionPipeline::new(bus, Duration::from_millis(config.cache.ttl_ms));
        let mut cycle = Self::new(pipeline, AlarmEngine::new(config.alarms.clone()), handle);
        if let Some(path) = &config.gateway.snapshot_file {
            cycle = cycle.with_sink(Box::new(JsonFileSink::new(path)));
        }
        if let Some(path) = &config.gateway.data_log_file {
            cycle = cycle.with_sink(Box::new(JsonLinesSink::new(path)));
        }
        cycle
    }

    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn handle(&self) -> &GatewayHandle {
        &self.handle
    }

    pub fn pipeline_mut(&mut self) -> &mut AcquisitionPipeline<B> {
        &mut self.pipeline
    }

    /// Run one full cycle. Nothing here fails: every problem is logged and
    /// reflected in the report.
    pub async fn run_once(&mut self, running: &AtomicBool) -> CycleReport {
        let snapshot = Arc::new(self.pipeline.run_cycle(running).await);
        let link_lost = self.pipeline.link_lost();

        let alarms = {
            let mut state = self.handle.alarms.write().await;
            self.alarm_engine.evaluate(&snapshot, &mut state)
        };

        let actuation_failures = {
            let mut bank = self.handle.relays.lock().await;
            self.policy.apply(&snapshot, &mut bank).await
        };

        for sink in &self.sinks {
            if let Err(err) = sink.publish(&snapshot) {
                warn!("Snapshot sink failed: {:#}", err);
            }
        }

        self.handle.publish(snapshot.clone()).await;

        info!(
            "Cycle complete: {} measurement(s), {} alarm(s), {} relay failure(s)",
            snapshot.keys().len(),
            alarms.len(),
            actuation_failures.len()
        );

        CycleReport {
            snapshot,
            alarms,
            actuation_failures,
            link_lost,
        }
    }
}
