// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust field gateway library
//!
//! This library polls wired sensors over a Modbus serial bus, decodes their
//! registers into typed measurements, raises threshold alarms and drives
//! relay outputs from a fixed automation policy.
//!
//! Data flows one way per cycle:
//! bus → decoder → cache → acquisition pipeline → snapshot → {alarms, relays}.

pub mod acquisition;
pub mod alarm;
pub mod bus;
pub mod config;
pub mod daemon;
pub mod decoder;
pub mod error;
pub mod modbus;
pub mod relay;
