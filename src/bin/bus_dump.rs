// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Read raw registers from one field device
//!
//! Handy for checking wiring and address maps on site:
//!
//! ```bash
//! bus_dump --serial-port /dev/ttyUSB0 --slave 123 --address 14 --quantity 2
//! bus_dump --tcp 127.0.0.1:5020 --slave 4 --input --address 12320
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use rust_field_gateway::bus::{BusClient, ModbusBusClient, RegisterBank};
use rust_field_gateway::config::BusConfig;
use rust_field_gateway::decoder::{decode_float32, decode_u32};

/// Read raw Modbus registers and show common decodings
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Serial device for Modbus RTU
    #[arg(long, default_value = "/tmp/ttySIM1")]
    serial_port: String,

    /// Serial line speed
    #[arg(long, default_value_t = 9600)]
    baudrate: u32,

    /// Use Modbus TCP at ADDRESS:PORT instead of the serial line
    #[arg(long, value_name = "ADDRESS:PORT")]
    tcp: Option<String>,

    /// Slave (unit) identifier
    #[arg(long, default_value_t = 1)]
    slave: u8,

    /// First register address
    #[arg(long, default_value_t = 0)]
    address: u16,

    /// Number of registers to read
    #[arg(long, default_value_t = 2)]
    quantity: u16,

    /// Read input registers instead of holding registers
    #[arg(long)]
    input: bool,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let timeout = Duration::from_millis(args.timeout_ms);

    let mut client = match &args.tcp {
        Some(endpoint) => {
            let (address, port) = endpoint
                .rsplit_once(':')
                .context("--tcp expects ADDRESS:PORT")?;
            let port: u16 = port
                .parse()
                .with_context(|| format!("Invalid TCP port '{}'", port))?;
            ModbusBusClient::connect_tcp(address, port, timeout).await?
        }
        None => {
            let config = BusConfig {
                serial_port: args.serial_port.clone(),
                baudrate: args.baudrate,
                timeout_ms: args.timeout_ms,
                ..BusConfig::default()
            };
            ModbusBusClient::open_rtu(&config)?
        }
    };

    let bank = if args.input {
        RegisterBank::Input
    } else {
        RegisterBank::Holding
    };

    println!(
        "Reading {} {} register(s) from slave {} at 0x{:04X} via {}",
        args.quantity,
        bank,
        args.slave,
        args.address,
        client.endpoint()
    );

    let words = client
        .read_registers(args.slave, args.address, args.quantity, bank)
        .await?;

    println!("Raw register values: {:?}", words);
    for (offset, pair) in words.chunks_exact(2).enumerate() {
        let pair = [pair[0], pair[1]];
        println!(
            "  0x{:04X}: float32 = {}, u32 = {}",
            usize::from(args.address) + 2 * offset,
            decode_float32(pair),
            decode_u32(pair)
        );
    }

    Ok(())
}
