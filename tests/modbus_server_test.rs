// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the Modbus device simulator
//!
//! These tests start the simulator on an ephemeral port and talk to it with a
//! plain `tokio-modbus` client, then with the gateway's own bus client.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use rust_field_gateway::acquisition::AcquisitionPipeline;
use rust_field_gateway::bus::simulated::{BMS_SLAVE, ENV_SLAVE, LDR_SLAVE, PIR_SLAVE};
use rust_field_gateway::bus::{BusClient, ModbusBusClient, RegisterBank, SharedDevices, SimulatedDevices};
use rust_field_gateway::decoder::{decode_float32, decode_u32};
use rust_field_gateway::error::ReadError;
use rust_field_gateway::modbus::serve_simulator;

fn test_devices() -> SharedDevices {
    let mut devices = SimulatedDevices::new();
    devices.set_u32(LDR_SLAVE, RegisterBank::Holding, 0x0000, 12_345);
    devices.set_word(PIR_SLAVE, RegisterBank::Holding, 0x0006, 1);
    devices.set_float(ENV_SLAVE, RegisterBank::Holding, 0x000E, 21.5);
    devices.set_word(BMS_SLAVE, RegisterBank::Input, 0x3020, 87);
    Arc::new(Mutex::new(devices))
}

/// Test utility function to start the simulator in the background
async fn start_test_server(
    devices: SharedDevices,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>> {
    // Use port 0 to let the OS assign an available port
    let listener = TcpListener::bind(SocketAddr::from_str("127.0.0.1:0")?).await?;
    let socket_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve_simulator(listener, devices).await {
            eprintln!("Server error: {:#}", e);
        }
    });

    // Give the server a moment to start
    time::sleep(Duration::from_millis(100)).await;

    Ok((socket_addr, handle))
}

#[tokio::test]
async fn test_read_holding_registers_per_slave() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(test_devices()).await?;

    let mut ctx = tcp::connect_slave(socket_addr, Slave(LDR_SLAVE)).await?;
    let lux = ctx.read_holding_registers(0x0000, 2).await??;
    assert_eq!(decode_u32([lux[0], lux[1]]), 12_345);

    ctx.set_slave(Slave(ENV_SLAVE));
    let temperature = ctx.read_holding_registers(0x000E, 2).await??;
    assert_eq!(decode_float32([temperature[0], temperature[1]]), 21.5);

    ctx.set_slave(Slave(PIR_SLAVE));
    assert_eq!(ctx.read_holding_registers(0x0006, 1).await??, vec![1]);

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_read_input_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(test_devices()).await?;

    let mut ctx = tcp::connect_slave(socket_addr, Slave(BMS_SLAVE)).await?;
    assert_eq!(ctx.read_input_registers(0x3020, 1).await??, vec![87]);

    // The state of charge is an input register, not a holding one
    let res = ctx.read_holding_registers(0x3020, 1).await?;
    assert_eq!(res, Err(ExceptionCode::IllegalDataAddress));

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_error_conditions() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(test_devices()).await?;

    let mut ctx = tcp::connect_slave(socket_addr, Slave(ENV_SLAVE)).await?;

    // One missing register in the range fails the whole request
    let res = ctx.read_holding_registers(0x000E, 4).await?;
    assert_eq!(res, Err(ExceptionCode::IllegalDataAddress));

    // Writes are not implemented by the simulated devices
    let res = ctx.write_single_register(0x000E, 0).await?;
    assert_eq!(res, Err(ExceptionCode::IllegalFunction));

    // Nothing answers for unit 99
    ctx.set_slave(Slave(99));
    let res = ctx.read_holding_registers(0x0000, 1).await?;
    assert_eq!(res, Err(ExceptionCode::GatewayTargetDevice));

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_bus_client_against_simulator() -> Result<(), Box<dyn std::error::Error>> {
    let devices = test_devices();
    let (socket_addr, server_handle) = start_test_server(devices.clone()).await?;

    let mut client = ModbusBusClient::connect_tcp(
        &socket_addr.ip().to_string(),
        socket_addr.port(),
        Duration::from_secs(2),
    )
    .await?;
    assert_eq!(client.endpoint(), socket_addr.to_string());

    let words = client
        .read_registers(BMS_SLAVE, 0x3020, 1, RegisterBank::Input)
        .await?;
    assert_eq!(words, vec![87]);

    let missing = client
        .read_registers(BMS_SLAVE, 0x4000, 1, RegisterBank::Input)
        .await;
    assert!(matches!(missing, Err(ReadError::Exception { slave: BMS_SLAVE, .. })));

    // Values written to the model are served on the next request
    devices
        .lock()
        .map_err(|_| "poisoned")?
        .set_word(BMS_SLAVE, RegisterBank::Input, 0x3020, 42);
    let words = client
        .read_registers(BMS_SLAVE, 0x3020, 1, RegisterBank::Input)
        .await?;
    assert_eq!(words, vec![42]);

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_pipeline_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(test_devices()).await?;

    let client = ModbusBusClient::connect_tcp(
        &socket_addr.ip().to_string(),
        socket_addr.port(),
        Duration::from_secs(2),
    )
    .await?;
    let mut pipeline = AcquisitionPipeline::new(client, Duration::from_secs(5));

    let snapshot = pipeline.poll().await;
    assert_eq!(snapshot.ldr_lux, Some(12_345));
    assert_eq!(snapshot.is_dark, Some(true));
    assert_eq!(snapshot.motion_detected, Some(true));
    assert_eq!(snapshot.battery_soc, Some(87));
    assert_eq!(snapshot.bms_low_power_mode, Some(false));

    // Only the temperature is present on the environment sensor
    assert_eq!(snapshot.temperature, Some(21.5));
    assert_eq!(snapshot.humidity, None);
    assert_eq!(snapshot.air_quality_score, None);
    assert_eq!(snapshot.pv_voltage, None);

    server_handle.abort();
    Ok(())
}
