//! Run context: the read-only snapshot the conditional evaluator
//! queries.
//!
//! The run executor owns the live state; evaluation receives it
//! behind [`RunContext`] so no engine ever reaches into an ambient
//! global namespace. [`SnapshotContext`] is a plain map-backed
//! implementation for embedders and tests.

use std::collections::HashMap;

use crate::signal::SignalSeries;

/// The most recent acquisition block: detector names and the
/// intensities measured on them. A signal whose detector is absent
/// from `keys` is considered inactive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBlock {
    pub keys: Vec<String>,
    pub values: Vec<f64>,
}

impl DataBlock {
    pub fn new(keys: Vec<String>, values: Vec<f64>) -> Self {
        Self { keys, values }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Read-only view of a run, immutable for the duration of one
/// evaluation call.
pub trait RunContext {
    /// Look up a signal by key (e.g. `Ar40`). Implementations may
    /// disambiguate by detector behind the key.
    fn signal(&self, name: &str) -> Option<&SignalSeries>;

    /// Current computed age, when the reduction pipeline provides one.
    fn age(&self) -> Option<f64> {
        None
    }

    /// Arbitrary `device.<name>` readback.
    fn device_value(&self, _name: &str) -> Option<f64> {
        None
    }

    /// `<device>.ig.pressure` ion-gauge readback.
    fn gauge_pressure(&self, _device: &str) -> Option<f64> {
        None
    }
}

/// Map-backed [`RunContext`] implementation.
#[derive(Debug, Clone, Default)]
pub struct SnapshotContext {
    signals: HashMap<String, SignalSeries>,
    age: Option<f64>,
    devices: HashMap<String, f64>,
    pressures: HashMap<String, f64>,
}

impl SnapshotContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_signal(&mut self, signal: SignalSeries) {
        self.signals.insert(signal.name.clone(), signal);
    }

    #[must_use]
    pub fn with_signal(mut self, signal: SignalSeries) -> Self {
        self.insert_signal(signal);
        self
    }

    pub fn set_age(&mut self, age: f64) {
        self.age = Some(age);
    }

    #[must_use]
    pub fn with_age(mut self, age: f64) -> Self {
        self.set_age(age);
        self
    }

    pub fn set_device_value(&mut self, name: impl Into<String>, value: f64) {
        self.devices.insert(name.into(), value);
    }

    pub fn set_gauge_pressure(&mut self, device: impl Into<String>, value: f64) {
        self.pressures.insert(device.into(), value);
    }

    pub fn signal_mut(&mut self, name: &str) -> Option<&mut SignalSeries> {
        self.signals.get_mut(name)
    }
}

impl RunContext for SnapshotContext {
    fn signal(&self, name: &str) -> Option<&SignalSeries> {
        self.signals.get(name)
    }

    fn age(&self) -> Option<f64> {
        self.age
    }

    fn device_value(&self, name: &str) -> Option<f64> {
        self.devices.get(name).copied()
    }

    fn gauge_pressure(&self, device: &str) -> Option<f64> {
        self.pressures.get(device).copied()
    }
}
