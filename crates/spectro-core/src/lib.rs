//! `spectro-core`
//!
//! Shared data model for noble-gas mass-spectrometer run automation.
//!
//! This crate provides the read-only view of a run that the automation
//! engines in `spectro-automation` query while an analysis is in
//! progress:
//!
//! - [`SignalSeries`]: one named measured quantity (an isotope's
//!   intensity on a detector), with its append-only point history,
//!   regressed value, baseline and deflection, plus windowed
//!   statistics (`mean`/`min`/`max`/`slope`).
//! - [`RunContext`]: the snapshot trait the conditional evaluator is
//!   handed once per acquired data point. The run executor owns the
//!   mutable state; evaluation only ever reads it.
//! - [`DataBlock`]: the most recent acquisition block (detector names
//!   plus measured intensities), used for detector-inactive tests.
//!
//! All windowed statistics return `Option<f64>`: `None` means "not
//! enough data yet", a distinct outcome the caller must not collapse
//! into a boolean.

pub mod context;
pub mod signal;

pub use context::{DataBlock, RunContext, SnapshotContext};
pub use signal::{DataPoint, SignalSeries};
