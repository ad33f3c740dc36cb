// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Short-lived register read cache
//!
//! Several measurements live on the same physical device, and cycles can be
//! closely spaced. The cache keeps each raw read for a fixed time-to-live so
//! the bus is not asked twice for the same words within that window.
//!
//! Eviction is lazy: an entry whose age has reached the TTL is removed when it
//! is looked up, there is no background sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::bus::{RawRegisterBlock, RegisterKey};

/// Default time-to-live of a cached read.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CacheEntry {
    block: RawRegisterBlock,
    read_at: Instant,
}

/// Memo of recent register reads keyed by (slave, address, count, bank).
#[derive(Debug, Clone)]
pub struct SensorCache {
    ttl: Duration,
    entries: HashMap<RegisterKey, CacheEntry>,
}

impl Default for SensorCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl SensorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached block for `key`, if it is younger than the TTL.
    pub fn get(&mut self, key: &RegisterKey) -> Option<RawRegisterBlock> {
        self.get_at(key, Instant::now())
    }

    /// Same as [`SensorCache::get`] with an explicit clock reading.
    pub fn get_at(&mut self, key: &RegisterKey, now: Instant) -> Option<RawRegisterBlock> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.read_at) >= self.ttl {
            debug!("Cache entry for {} expired", key);
            self.entries.remove(key);
            return None;
        }
        Some(entry.block.clone())
    }

    /// Store `block` under `key`, replacing any previous entry.
    pub fn put(&mut self, key: RegisterKey, block: RawRegisterBlock) {
        self.put_at(key, block, Instant::now());
    }

    pub fn put_at(&mut self, key: RegisterKey, block: RawRegisterBlock, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                block,
                read_at: now,
            },
        );
    }

    /// Number of stored entries, expired ones included until they are looked up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
