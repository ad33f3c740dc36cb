// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy of the acquisition and automation engine
//!
//! None of these errors is fatal: a read or decode failure removes the
//! affected fields from the current snapshot, an actuation failure leaves the
//! affected relay in its previous state.

use thiserror::Error;

use crate::bus::RegisterBank;

/// A register read that produced no usable words.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("slave {slave}: no response within {timeout_ms} ms reading {bank} register 0x{address:04X}")]
    Timeout {
        slave: u8,
        address: u16,
        bank: RegisterBank,
        timeout_ms: u64,
    },

    #[error("slave {slave}: transport failure reading {bank} register 0x{address:04X}: {reason}")]
    Transport {
        slave: u8,
        address: u16,
        bank: RegisterBank,
        reason: String,
    },

    #[error("slave {slave}: exception response for {bank} register 0x{address:04X}: {exception}")]
    Exception {
        slave: u8,
        address: u16,
        bank: RegisterBank,
        exception: String,
    },

    #[error("bus is not connected: {reason}")]
    NotConnected { reason: String },
}

impl ReadError {
    /// Failures of the link itself rather than of one device on it.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, ReadError::Transport { .. } | ReadError::NotConnected { .. })
    }
}

/// A register payload that does not have the shape its field expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("slave {slave} register 0x{address:04X}: expected {expected} words, got {actual}")]
    WordCount {
        slave: u8,
        address: u16,
        expected: usize,
        actual: usize,
    },
}

/// A relay write that did not reach the output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuationError {
    #[error("unknown relay '{name}'")]
    UnknownRelay { name: String },

    #[error("relay '{name}' has no output line configured")]
    Unmapped { name: String },

    #[error("relay '{name}' output failed: {reason}")]
    Output { name: String, reason: String },
}

/// Failure of one acquisition step, reported and then dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
