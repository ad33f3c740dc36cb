// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Active alarms and alarm history

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::Alarm;

/// Default number of alarms kept in the history.
pub const MAX_HISTORY_SIZE: usize = 100;

/// Process-lifetime alarm bookkeeping.
///
/// `active` holds at most one alarm per (sensor, level); `history` keeps every
/// recorded alarm in insertion order, dropping the oldest beyond its capacity.
#[derive(Debug, Clone)]
pub struct AlarmState {
    active: Vec<Alarm>,
    history: VecDeque<Alarm>,
    max_history: usize,
}

impl Default for AlarmState {
    fn default() -> Self {
        Self::new(MAX_HISTORY_SIZE)
    }
}

impl AlarmState {
    pub fn new(max_history: usize) -> Self {
        Self {
            active: Vec::new(),
            history: VecDeque::with_capacity(max_history),
            max_history: max_history.max(1),
        }
    }

    /// Record a fired alarm.
    ///
    /// Returns `true` when the alarm entered the active set, `false` when an
    /// alarm with the same sensor and level was already active. The history
    /// receives the alarm in both cases.
    pub fn record(&mut self, alarm: Alarm) -> bool {
        let is_new = !self.active.iter().any(|a| a.same_slot(&alarm));
        if is_new {
            self.active.push(alarm.clone());
        }

        self.history.push_back(alarm);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }

        is_new
    }

    /// Remove active alarms for `sensor`, or all of them. History is kept.
    pub fn clear(&mut self, sensor: Option<&str>) -> usize {
        let before = self.active.len();
        match sensor {
            Some(sensor) => self.active.retain(|a| a.sensor != sensor),
            None => self.active.clear(),
        }
        before - self.active.len()
    }

    pub fn active(&self) -> &[Alarm] {
        &self.active
    }

    /// The last `limit` history entries, oldest first; everything when `None`.
    pub fn history(&self, limit: Option<usize>) -> Vec<Alarm> {
        let skip = limit.map_or(0, |limit| self.history.len().saturating_sub(limit));
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

/// Alarm state shared between the poll task and external readers.
pub type SharedAlarmState = Arc<RwLock<AlarmState>>;

pub fn create_shared_alarm_state(max_history: usize) -> SharedAlarmState {
    Arc::new(RwLock::new(AlarmState::new(max_history)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmLevel;

    fn alarm(sensor: &str, level: AlarmLevel, value: f64) -> Alarm {
        Alarm::new(level, sensor, value, 0.0, format!("{sensor} = {value}"))
    }

    #[test]
    fn test_duplicate_goes_to_history_only() {
        let mut state = AlarmState::default();
        assert!(state.record(alarm("co2", AlarmLevel::Critical, 2100.0)));
        assert!(!state.record(alarm("co2", AlarmLevel::Critical, 2200.0)));

        assert_eq!(state.active().len(), 1);
        assert_eq!(state.active()[0].value, 2100.0);
        assert_eq!(state.history_len(), 2);
    }

    #[test]
    fn test_same_sensor_different_level_both_active() {
        let mut state = AlarmState::default();
        state.record(alarm("temperature", AlarmLevel::Warning, 36.0));
        state.record(alarm("temperature", AlarmLevel::Critical, 50.0));
        assert_eq!(state.active().len(), 2);
    }

    #[test]
    fn test_history_keeps_last_hundred_in_order() {
        let mut state = AlarmState::default();
        for i in 1..=150 {
            state.record(alarm("humidity", AlarmLevel::Warning, i as f64));
        }

        let history = state.history(None);
        assert_eq!(history.len(), 100);
        let values: Vec<f64> = history.iter().map(|a| a.value).collect();
        let expected: Vec<f64> = (51..=150).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_history_limit() {
        let mut state = AlarmState::new(10);
        for i in 1..=8 {
            state.record(alarm("pm2_5", AlarmLevel::Warning, i as f64));
        }
        let last = state.history(Some(3));
        assert_eq!(
            last.iter().map(|a| a.value).collect::<Vec<_>>(),
            vec![6.0, 7.0, 8.0]
        );
        assert_eq!(state.history(Some(50)).len(), 8);
    }

    #[test]
    fn test_clear_by_sensor_keeps_history() {
        let mut state = AlarmState::default();
        state.record(alarm("co2", AlarmLevel::Critical, 2100.0));
        state.record(alarm("humidity", AlarmLevel::Warning, 90.0));
        state.record(alarm("humidity", AlarmLevel::Warning, 91.0));

        assert_eq!(state.clear(Some("humidity")), 1);
        assert_eq!(state.active().len(), 1);
        assert_eq!(state.active()[0].sensor, "co2");
        assert_eq!(state.history_len(), 3);

        assert_eq!(state.clear(None), 1);
        assert!(state.active().is_empty());
        assert_eq!(state.history_len(), 3);
    }

    #[test]
    fn test_cleared_alarm_can_fire_again() {
        let mut state = AlarmState::default();
        state.record(alarm("co2", AlarmLevel::Critical, 2100.0));
        state.clear(Some("co2"));
        assert!(state.record(alarm("co2", AlarmLevel::Critical, 2300.0)));
        assert_eq!(state.active()[0].value, 2300.0);
    }
}
