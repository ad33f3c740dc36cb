// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor acquisition
//!
//! This module turns raw register reads into [`Snapshot`]s:
//!
//! - [`SensorCache`]: short-lived memo of register reads
//! - [`AcquisitionPipeline`]: one polling cycle over every field device
//! - [`classify`]: air quality, weather and charge-controller classifiers
//! - [`SnapshotSink`]: consumers of finished snapshots

pub mod cache;
pub mod classify;
pub mod pipeline;
pub mod sink;
pub mod snapshot;

pub use cache::SensorCache;
pub use classify::{AirQuality, MpptStatus, WeatherStatus};
pub use pipeline::{AcquisitionPipeline, DeviceStep};
pub use sink::{JsonFileSink, JsonLinesSink, SnapshotSink};
pub use snapshot::Snapshot;
