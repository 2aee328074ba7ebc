//! Conditionals: named, typed monitor expressions evaluated against
//! live signals during acquisition.
//!
//! A conditional is declared once, in the leading documentation block
//! of a measurement script or in a standalone conditionals document,
//! and constructed at script-setup time. Construction compiles every
//! clause and the optional mapper; a malformed declaration is rejected
//! there, never mid-run. During acquisition the executor calls
//! [`Conditional::check`] once per acquired data point and branches on
//! the tristate result:
//!
//! - `Some(true)` — the condition tripped; what happens next depends
//!   on the conditional's [`ConditionalKind`] (fire an action,
//!   truncate collection, terminate the run, cancel the queue).
//! - `Some(false)` — evaluated, did not trip.
//! - `None` — not enough data yet (or the start-count/frequency gate
//!   kept the check from running); keep collecting.

mod eval;
mod token;

pub use eval::{AggFunc, ClauseKind, Comparator, CompiledClause, Mapper, Operand, SignalModifier};
pub use token::{tokenize, Join};

use serde::Deserialize;
use spectro_core::{DataBlock, RunContext};

use crate::error::ConditionalError;

/// What the executor does with a tripped conditional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConditionalKind {
    /// Fire a side effect; `resume` continues acquisition afterwards.
    Action { resume: bool },
    /// End the current collection interval early but keep the run.
    /// `abbreviated_count_ratio` scales the remaining measurement.
    Truncation { abbreviated_count_ratio: f64 },
    /// Abort the run. `nfails` consecutive trips are required before
    /// the executor acts.
    Termination { nfails: u32 },
    /// Cancel the whole queue.
    Cancelation,
}

/// Declarative form of a conditional, as embedded in script
/// documentation blocks or conditionals documents. The legacy key
/// spellings `teststr` and `start` are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionalSpec {
    #[serde(alias = "teststr")]
    pub check: String,
    #[serde(default)]
    pub attr: String,
    #[serde(default)]
    pub window: Option<usize>,
    #[serde(default)]
    pub mapper: Option<String>,
    #[serde(default)]
    pub frequency: Option<u32>,
    #[serde(default, alias = "start")]
    pub start_count: Option<u32>,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub abbreviated_count_ratio: Option<f64>,
    #[serde(default)]
    pub nfails: Option<u32>,
}

/// A compiled conditional. Immutable after construction.
#[derive(Debug)]
pub struct Conditional {
    teststr: String,
    attr: String,
    kind: ConditionalKind,
    window: Option<usize>,
    mapper: Option<Mapper>,
    frequency: u32,
    start_count: u32,
    clauses: Vec<(CompiledClause, Option<Join>)>,
}

impl Conditional {
    /// Compile a declaration. Any unparseable clause or mapper rejects
    /// the whole conditional.
    pub fn from_spec(spec: &ConditionalSpec, kind: ConditionalKind) -> Result<Self, ConditionalError> {
        let teststr = spec.check.trim();
        if teststr.is_empty() {
            return Err(ConditionalError::Empty);
        }
        let mut clauses = Vec::new();
        for (clause, join) in tokenize(teststr) {
            clauses.push((CompiledClause::parse(&clause)?, join));
        }
        let mapper = spec
            .mapper
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(Mapper::compile)
            .transpose()?;
        Ok(Self {
            teststr: teststr.to_string(),
            attr: spec.attr.clone(),
            kind,
            window: spec.window.filter(|w| *w > 0),
            mapper,
            frequency: spec.frequency.unwrap_or(1).max(1),
            start_count: spec.start_count.unwrap_or(0),
            clauses,
        })
    }

    /// Compile a bare check string with default metadata.
    pub fn parse(check: &str, kind: ConditionalKind) -> Result<Self, ConditionalError> {
        Self::from_spec(
            &ConditionalSpec {
                check: check.to_string(),
                ..ConditionalSpec::default()
            },
            kind,
        )
    }

    pub fn teststr(&self) -> &str {
        &self.teststr
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }

    pub fn kind(&self) -> ConditionalKind {
        self.kind
    }

    pub fn window(&self) -> Option<usize> {
        self.window
    }

    /// Start-count/frequency gate: the check runs once `count` is past
    /// `start_count` and the offset is a multiple of `frequency`.
    fn should_check(&self, count: usize) -> bool {
        let Some(offset) = count.checked_sub(self.start_count as usize) else {
            return false;
        };
        offset > 0 && offset % self.frequency as usize == 0
    }

    /// Gate on the point count, then evaluate. `None` when gated out
    /// or indeterminate.
    pub fn check(
        &self,
        ctx: &dyn RunContext,
        data: &DataBlock,
        count: usize,
    ) -> Option<bool> {
        if !self.should_check(count) {
            return None;
        }
        self.evaluate(ctx, data)
    }

    /// Evaluate all clauses left to right, combining with the stored
    /// joins. An indeterminate clause makes the whole evaluation
    /// indeterminate; the caller must treat that as "not yet decided".
    pub fn evaluate(&self, ctx: &dyn RunContext, data: &DataBlock) -> Option<bool> {
        let mut acc: Option<bool> = None;
        let mut pending: Option<Join> = None;
        for (i, (clause, join)) in self.clauses.iter().enumerate() {
            let v = clause.evaluate(ctx, data, self.window, self.mapper.as_ref());
            acc = if i == 0 {
                v
            } else {
                match (acc, v, pending) {
                    (Some(a), Some(b), Some(Join::And)) => Some(a && b),
                    (Some(a), Some(b), Some(Join::Or)) => Some(a || b),
                    _ => None,
                }
            };
            pending = *join;
        }
        tracing::debug!(teststr = %self.teststr, result = ?acc, "conditional evaluated");
        acc
    }
}

/// Conditionals document: one section per role.
#[derive(Debug, Default, Deserialize)]
struct ConditionalsDoc {
    #[serde(default)]
    actions: Vec<ConditionalSpec>,
    #[serde(default)]
    truncations: Vec<ConditionalSpec>,
    #[serde(default)]
    terminations: Vec<ConditionalSpec>,
    #[serde(default)]
    cancelations: Vec<ConditionalSpec>,
}

/// Load a conditionals document (YAML with `actions` / `truncations` /
/// `terminations` / `cancelations` sections). One bad entry rejects
/// the whole document.
pub fn load_conditionals(text: &str) -> Result<Vec<Conditional>, ConditionalError> {
    let doc: ConditionalsDoc = serde_yaml::from_str(text)?;
    let mut out = Vec::new();
    for spec in &doc.actions {
        out.push(Conditional::from_spec(
            spec,
            ConditionalKind::Action { resume: spec.resume },
        )?);
    }
    for spec in &doc.truncations {
        out.push(Conditional::from_spec(
            spec,
            ConditionalKind::Truncation {
                abbreviated_count_ratio: spec.abbreviated_count_ratio.unwrap_or(1.0),
            },
        )?);
    }
    for spec in &doc.terminations {
        out.push(Conditional::from_spec(
            spec,
            ConditionalKind::Termination {
                nfails: spec.nfails.unwrap_or(1),
            },
        )?);
    }
    for spec in &doc.cancelations {
        out.push(Conditional::from_spec(spec, ConditionalKind::Cancelation)?);
    }
    tracing::debug!(count = out.len(), "loaded conditionals document");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectro_core::{SignalSeries, SnapshotContext};

    fn termination(check: &str) -> Conditional {
        Conditional::parse(check, ConditionalKind::Termination { nfails: 1 }).unwrap()
    }

    #[test]
    fn test_indeterminate_slope_returns_none() {
        let cond = termination("not slope(Ar40)>0.1");
        let mut signal = SignalSeries::new("Ar40");
        signal.push(0.0, 1.0);
        let ctx = SnapshotContext::new().with_signal(signal);
        assert_eq!(cond.evaluate(&ctx, &DataBlock::default()), None);
    }

    #[test]
    fn test_left_to_right_joins() {
        let cond = termination("Ar40>50 and age>10 or age<0");
        let ctx = SnapshotContext::new()
            .with_signal(SignalSeries::new("Ar40").with_value(100.0))
            .with_age(5.0);
        // (true and false) or false -> false
        assert_eq!(cond.evaluate(&ctx, &DataBlock::default()), Some(false));

        let ctx = SnapshotContext::new()
            .with_signal(SignalSeries::new("Ar40").with_value(100.0))
            .with_age(-1.0);
        // (true and false) or true -> true
        assert_eq!(cond.evaluate(&ctx, &DataBlock::default()), Some(true));
    }

    #[test]
    fn test_indeterminate_propagates_through_joins() {
        let cond = termination("Ar40>50 or slope(Ar39)>0.1");
        // Ar39 has no points: the second clause is indeterminate, so
        // the whole evaluation is, even though the first clause is true.
        let ctx = SnapshotContext::new()
            .with_signal(SignalSeries::new("Ar40").with_value(100.0))
            .with_signal(SignalSeries::new("Ar39"));
        assert_eq!(cond.evaluate(&ctx, &DataBlock::default()), None);
    }

    #[test]
    fn test_start_count_and_frequency_gate() {
        let spec = ConditionalSpec {
            check: "Ar40>50".to_string(),
            start_count: Some(10),
            frequency: Some(5),
            ..ConditionalSpec::default()
        };
        let cond =
            Conditional::from_spec(&spec, ConditionalKind::Truncation {
                abbreviated_count_ratio: 1.0,
            })
            .unwrap();
        let ctx = SnapshotContext::new().with_signal(SignalSeries::new("Ar40").with_value(100.0));
        let data = DataBlock::default();

        assert_eq!(cond.check(&ctx, &data, 5), None); // before start
        assert_eq!(cond.check(&ctx, &data, 10), None); // offset 0
        assert_eq!(cond.check(&ctx, &data, 12), None); // off cadence
        assert_eq!(cond.check(&ctx, &data, 15), Some(true));
        assert_eq!(cond.check(&ctx, &data, 20), Some(true));
    }

    #[test]
    fn test_malformed_check_rejected_at_construction() {
        assert!(Conditional::parse("Ar40 !! 50", ConditionalKind::Cancelation).is_err());
        assert!(Conditional::parse("", ConditionalKind::Cancelation).is_err());
    }

    #[test]
    fn test_spec_mapper_applied() {
        let spec = ConditionalSpec {
            check: "Ar40>10".to_string(),
            mapper: Some("x * 2.0".to_string()),
            ..ConditionalSpec::default()
        };
        let cond = Conditional::from_spec(&spec, ConditionalKind::Action { resume: false }).unwrap();
        let ctx = SnapshotContext::new().with_signal(SignalSeries::new("Ar40").with_value(6.0));
        assert_eq!(cond.evaluate(&ctx, &DataBlock::default()), Some(true));
    }

    #[test]
    fn test_load_conditionals_document() {
        let doc = r#"
actions:
  - check: Ar40.cur > 100
    resume: true
truncations:
  - check: age < 0
    abbreviated_count_ratio: 0.5
terminations:
  - teststr: H1.inactive
    nfails: 3
cancelations:
  - check: device.pneumatics < 10
"#;
        let conds = load_conditionals(doc).unwrap();
        assert_eq!(conds.len(), 4);
        assert_eq!(conds[0].kind(), ConditionalKind::Action { resume: true });
        assert_eq!(
            conds[1].kind(),
            ConditionalKind::Truncation {
                abbreviated_count_ratio: 0.5
            }
        );
        assert_eq!(conds[2].kind(), ConditionalKind::Termination { nfails: 3 });
        assert_eq!(conds[3].kind(), ConditionalKind::Cancelation);
    }

    #[test]
    fn test_bad_entry_rejects_document() {
        let doc = r#"
terminations:
  - check: bogus(Ar40) > 1
"#;
        assert!(load_conditionals(doc).is_err());
    }
}
