//! `spectro-automation`
//!
//! Decision engines for unattended noble-gas mass-spectrometer
//! analytical sequences. Three independent, synchronous, side-effect
//! free components:
//!
//! - [`conditional`]: a small boolean expression language evaluated
//!   against live signals once per acquired data point. A conditional
//!   is typed (action / truncation / termination / cancelation) and
//!   reports a tristate: `Some(true)` trip, `Some(false)` pass,
//!   `None` not enough data yet.
//! - [`frequency`]: computes the index positions at which reference
//!   analyses (blanks, airs) must be inserted into a run list, either
//!   on a periodic cadence or from a short batch-aware template
//!   string.
//! - [`hops`]: compiles a compact textual or structured description of
//!   magnet hops (which isotope lands on which detector, for how
//!   long) into a validated, executable [`hops::HopSequence`].
//!
//! The physical run executor, persistence and GUI live elsewhere; the
//! engines here only read externally supplied snapshots and return
//! values. Malformed inputs are rejected at construction time, before
//! any hardware action occurs.

pub mod conditional;
pub mod error;
pub mod frequency;
pub mod hops;

pub use conditional::{
    load_conditionals, tokenize, Conditional, ConditionalKind, ConditionalSpec, Join,
};
pub use error::{ConditionalError, HopError, TemplateError};
pub use frequency::{
    insertion_indices, template_insertion_indices, validate_frequency_template,
    FrequencyTemplate, QueueRun, RunSpec,
};
pub use hops::{generate_hops, Hop, HopRecord, HopSequence, Position};
