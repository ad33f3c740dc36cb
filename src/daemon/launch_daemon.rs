// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! This module runs the gateway's background tasks:
//!
//! - Gateway polling loop (acquisition, alarms, relay automation)
//! - Modbus TCP device simulator and its value refresh
//! - System health monitoring (heartbeat)
//!
//! Every task watches a shared `running` flag; [`Daemon::shutdown`] clears it
//! and [`Daemon::join`] waits for the tasks to wind down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::gateway::{GatewayCycle, GatewayHandle};
use crate::bus::{self, BusClient, SharedDevices, SimulatedDevices};
use crate::config::{BusTransport, Config};
use crate::modbus::serve_simulator;
use crate::relay::create_actuator;

/// Granularity at which sleeping tasks notice a shutdown request.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

/// Represents a daemon task manager that coordinates the gateway services
///
/// # Fields
///
/// * `tasks` - Collection of handles to running tasks for management and cleanup
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `handle` - Shared gateway state, available once the daemon is launched
/// * `devices` - Simulated register model, when the simulator or the simulated bus is used
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    handle: Option<GatewayHandle>,
    devices: Option<SharedDevices>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance with no task and the running flag set.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_field_gateway::daemon::launch_daemon::Daemon;
    ///
    /// let daemon = Daemon::new();
    /// assert!(daemon.handle().is_none());
    /// ```
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            handle: None,
            devices: None,
        }
    }

    /// Launch all configured tasks
    ///
    /// The following services may be started:
    /// * Device simulator - If `config.simulator.enabled` is `true`
    /// * Simulated value refresh - With the simulator or the `simulated` bus transport
    /// * Gateway polling loop - Always
    /// * Heartbeat monitoring - Always
    ///
    /// # Errors
    ///
    /// Fails if the relay actuator cannot be created or the simulator cannot
    /// bind its address. A bus that cannot be opened is not an error here:
    /// the polling loop retries it on every tick.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let needs_devices =
            config.simulator.enabled || config.bus.transport == BusTransport::Simulated;
        if needs_devices {
            let devices = SimulatedDevices::shared_randomized();
            self.start_device_refresh(
                devices.clone(),
                Duration::from_secs(config.simulator.refresh_secs),
            );
            self.devices = Some(devices);
        }

        if config.simulator.enabled {
            self.start_simulator_server(config).await?;
        }

        let actuator =
            create_actuator(&config.relays).context("Failed to create relay actuator")?;
        let handle = GatewayHandle::from_config(config, actuator);
        self.handle = Some(handle.clone());

        self.start_gateway_poll(config, handle);
        self.start_heartbeat();

        info!(
            "Gateway '{}' started ({} tasks)",
            config.gateway.name,
            self.tasks.len()
        );
        Ok(())
    }

    /// Shared gateway state, `None` before [`Daemon::launch`].
    pub fn handle(&self) -> Option<GatewayHandle> {
        self.handle.clone()
    }

    /// Simulated register model, if one is in use.
    pub fn devices(&self) -> Option<SharedDevices> {
        self.devices.clone()
    }

    /// Start the polling loop
    ///
    /// The loop owns the bus client: cycles never overlap, and a tick that
    /// arrives while a cycle is still running is skipped.
    fn start_gateway_poll(&mut self, config: &Config, handle: GatewayHandle) {
        info!(
            "Starting gateway poll every {} s over {:?} bus",
            config.gateway.interval_secs, config.bus.transport
        );

        let config = config.clone();
        let running = self.running.clone();
        let devices = self.devices.clone();

        let task = tokio::spawn(async move {
            let bus_config = config.bus.clone();
            let connect = move || {
                let bus_config = bus_config.clone();
                let devices = devices.clone();
                async move { bus::connect(&bus_config, devices).await }
            };
            poll_loop(&config, handle, running, connect).await;
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Start the Modbus TCP device simulator
    ///
    /// The listener is bound before returning so address errors surface at
    /// launch. The server runs until the daemon's `running` flag is cleared.
    async fn start_simulator_server(&mut self, config: &Config) -> Result<()> {
        let devices = self
            .devices
            .clone()
            .unwrap_or_else(SimulatedDevices::shared_randomized);

        let socket_addr: SocketAddr =
            format!("{}:{}", config.simulator.address, config.simulator.port)
                .parse()
                .with_context(|| {
                    format!(
                        "Invalid simulator address {}:{}",
                        config.simulator.address, config.simulator.port
                    )
                })?;
        let listener = TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("Failed to bind device simulator on {}", socket_addr))?;

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let server_handle = tokio::spawn(async move {
                if let Err(e) = serve_simulator(listener, devices).await {
                    error!("Modbus simulator error: {:#}", e);
                }
            });

            wait_for_shutdown(&running).await;

            info!("Shutting down Modbus device simulator...");
            server_handle.abort();

            match time::timeout(Duration::from_secs(5), server_handle).await {
                Ok(_) => info!("Modbus device simulator shut down successfully"),
                Err(_) => warn!("Modbus device simulator shutdown timed out, forcing termination"),
            }

            Ok(())
        });

        self.tasks.push(task);
        info!("Modbus device simulator started on {}", socket_addr);
        Ok(())
    }

    /// Redraw the simulated register values periodically
    fn start_device_refresh(&mut self, devices: SharedDevices, every: Duration) {
        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let mut rng = StdRng::from_os_rng();
            while sleep_while_running(&running, every).await {
                match devices.lock() {
                    Ok(mut devices) => devices.refresh(&mut rng),
                    Err(_) => anyhow::bail!("Simulated register model poisoned"),
                };
            }
            Ok(())
        });

        self.tasks.push(task);
    }

    fn start_heartbeat(&mut self) {
        info!("Starting heartbeat monitor");

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                debug!("Daemon heartbeat: running");
                if !sleep_while_running(&running, HEARTBEAT_PERIOD).await {
                    break;
                }
            }
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Signal all tasks to stop
    ///
    /// A cycle in progress finishes its current device step and returns a
    /// partial snapshot.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete
    ///
    /// Should be called after `shutdown()`. Each task gets five seconds;
    /// panics and task errors are logged, not returned.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        Ok(())
    }
}

/// Tick, connect on demand, run one cycle; until `running` is cleared.
///
/// The bus client is dropped and reopened on the next tick when a whole
/// cycle failed at the transport level.
pub(crate) async fn poll_loop<C, F>(
    config: &Config,
    handle: GatewayHandle,
    running: Arc<AtomicBool>,
    mut connect: C,
) where
    C: FnMut() -> F,
    F: Future<Output = Result<Box<dyn BusClient + Send>>>,
{
    let mut ticker = time::interval(Duration::from_secs(config.gateway.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycle: Option<GatewayCycle<Box<dyn BusClient + Send>>> = None;

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wait_for_shutdown(&running) => break,
        }

        if cycle.is_none() {
            match connect().await {
                Ok(client) => {
                    info!("Bus client connected");
                    cycle = Some(GatewayCycle::from_config(config, client, handle.clone()));
                }
                Err(err) => {
                    error!("Bus client unavailable, cycle skipped: {:#}", err);
                    continue;
                }
            }
        }

        let link_lost = match cycle.as_mut() {
            Some(cycle) => cycle.run_once(&running).await.link_lost,
            None => false,
        };
        if link_lost {
            warn!("Bus link lost, reconnecting on next tick");
            cycle = None;
        }
    }

    info!("Gateway poll loop stopped");
}

/// Resolve once `running` is cleared.
async fn wait_for_shutdown(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        time::sleep(SHUTDOWN_POLL).await;
    }
}

/// Sleep for `duration` in short slices; `false` if shutdown was requested.
async fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(SHUTDOWN_POLL);
        time::sleep(slice).await;
        remaining -= slice;
    }
    running.load(Ordering::SeqCst)
}
