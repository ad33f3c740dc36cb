// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Write-only consumers of finished snapshots

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use super::snapshot::Snapshot;

/// Receives every snapshot once its cycle is complete.
///
/// A failing sink is logged by the caller and never aborts the cycle.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Keeps the latest snapshot in a JSON file.
///
/// The document is written to a temporary sibling first and then renamed, so
/// readers never see a half-written file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonFileSink {
    fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write snapshot to {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move snapshot into {:?}", self.path))?;

        debug!("Snapshot written to {:?}", self.path);
        Ok(())
    }
}

/// Appends one JSON record per snapshot to a data log.
///
/// Each line is `{"timestamp": ..., "data": {...}}` where `data` holds the
/// exported measurements. The file is created on first use and never
/// truncated.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonLinesSink {
    fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let record = serde_json::json!({
            "timestamp": snapshot.created_at.to_rfc3339(),
            "data": snapshot.to_map(),
        });
        let line = serde_json::to_string(&record).context("Failed to serialize data record")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open data log {:?}", self.path))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to append to data log {:?}", self.path))?;

        debug!("Data record appended to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_json_file_sink_writes_exported_keys() {
        let dir = tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("latest.json"));

        let snapshot = Snapshot {
            battery_soc: Some(64),
            is_dark: Some(false),
            ..Snapshot::empty()
        };
        sink.publish(&snapshot).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(sink.path()).unwrap()).unwrap();
        assert_eq!(written["battery_soc"], 64);
        assert_eq!(written["is_dark"], false);
        assert!(written.get("temperature").is_none());
        assert!(written.get("timestamp").is_some());
    }

    #[test]
    fn test_json_lines_sink_appends_one_record_per_snapshot() {
        let dir = tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("data.jsonl"));

        let first = Snapshot {
            battery_soc: Some(64),
            ..Snapshot::empty()
        };
        let second = Snapshot {
            battery_soc: Some(63),
            temperature: Some(21.5),
            ..Snapshot::empty()
        };
        sink.publish(&first).unwrap();
        sink.publish(&second).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["data"]["battery_soc"], 64);
        assert!(records[0]["data"].get("temperature").is_none());
        assert!(records[0]["data"].get("timestamp").is_none());
        assert_eq!(records[1]["data"]["temperature"], 21.5);
        assert!(records[1]["timestamp"].is_string());
    }

    #[test]
    fn test_json_file_sink_reports_missing_directory() {
        let dir = tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("missing").join("latest.json"));
        assert!(sink.publish(&Snapshot::empty()).is_err());
    }
}
