//! Clause compilation and tristate evaluation.
//!
//! Each clause of a conditional is resolved once, at construction,
//! into a closed [`ClauseKind`] variant; unknown function names or
//! unparseable comparisons reject the conditional before any hardware
//! action occurs. Evaluation against a [`RunContext`] yields
//! `Option<bool>`: `None` means the run has not produced enough data
//! to decide yet and must never be read as "condition failed".
//!
//! Accepted signal-reference suffixes: `.cur` (alias `.current`),
//! `.bs`, `.bs_corrected`, `.deflection`, `.inactive`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use spectro_core::{DataBlock, RunContext, SignalSeries};

use crate::error::ConditionalError;

static COMPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<=|>=|==|<|>").expect("valid regex"));
static CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<fn>[a-z_]+)\((?P<args>.*)\)$").expect("valid regex"));
static DEVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^device\.(?P<dev>[\w.]+)$").expect("valid regex"));
static PRESSURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<dev>\w+)\.ig\.pressure$").expect("valid regex"));
static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]\w*$").expect("valid regex"));

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparator {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Eq => lhs == rhs,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "<" => Some(Comparator::Lt),
            "<=" => Some(Comparator::Le),
            ">" => Some(Comparator::Gt),
            ">=" => Some(Comparator::Ge),
            "==" => Some(Comparator::Eq),
            _ => None,
        }
    }
}

/// How a bare signal reference is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalModifier {
    /// Regressed value at the current point count (bare name).
    Value,
    /// Latest raw point (`.cur`).
    Current,
    /// Baseline value (`.bs`).
    Baseline,
    /// Baseline-corrected value (`.bs_corrected`).
    BaselineCorrected,
    /// Detector deflection readback (`.deflection`).
    Deflection,
}

/// Aggregate functions over a signal's point history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Min,
    Max,
    Average,
    Slope,
}

impl AggFunc {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            "average" => Some(AggFunc::Average),
            "slope" => Some(AggFunc::Slope),
            _ => None,
        }
    }

    fn apply(self, signal: &SignalSeries, window: Option<usize>) -> Option<f64> {
        match self {
            AggFunc::Min => signal.min(window),
            AggFunc::Max => signal.max(window),
            AggFunc::Average => signal.mean(window),
            AggFunc::Slope => signal.slope(window),
        }
    }
}

/// The left-hand side of a comparison, resolved at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Signal {
        name: String,
        modifier: SignalModifier,
    },
    Call {
        func: AggFunc,
        name: String,
        /// Inline window argument; overrides the conditional's window.
        window: Option<usize>,
    },
    Age,
    Device(String),
    GaugePressure(String),
}

impl Operand {
    fn parse(text: &str) -> Result<Self, ConditionalError> {
        let t = text.trim();
        if let Some(caps) = CALL_RE.captures(t) {
            let fname = &caps["fn"];
            let func = AggFunc::parse(fname)
                .ok_or_else(|| ConditionalError::UnknownFunction(fname.to_string()))?;
            let args = split_args(&caps["args"]);
            let (name, window) = match args.as_slice() {
                [name] => (name.clone(), None),
                [name, window] => {
                    let w: usize = window
                        .parse()
                        .map_err(|_| ConditionalError::InvalidNumber(window.clone()))?;
                    (name.clone(), Some(w))
                }
                _ => {
                    return Err(ConditionalError::BadArity {
                        func: match func {
                            AggFunc::Min => "min",
                            AggFunc::Max => "max",
                            AggFunc::Average => "average",
                            AggFunc::Slope => "slope",
                        },
                        expected: "1 or 2",
                        got: args.len(),
                    })
                }
            };
            if !KEY_RE.is_match(&name) {
                return Err(ConditionalError::UnrecognizedClause(t.to_string()));
            }
            return Ok(Operand::Call { func, name, window });
        }
        if let Some(caps) = DEVICE_RE.captures(t) {
            return Ok(Operand::Device(caps["dev"].to_string()));
        }
        if let Some(caps) = PRESSURE_RE.captures(t) {
            return Ok(Operand::GaugePressure(caps["dev"].to_string()));
        }
        if t == "age" {
            return Ok(Operand::Age);
        }
        for (suffix, modifier) in [
            (".bs_corrected", SignalModifier::BaselineCorrected),
            (".bs", SignalModifier::Baseline),
            (".current", SignalModifier::Current),
            (".cur", SignalModifier::Current),
            (".deflection", SignalModifier::Deflection),
        ] {
            if let Some(name) = t.strip_suffix(suffix) {
                if KEY_RE.is_match(name) {
                    return Ok(Operand::Signal {
                        name: name.to_string(),
                        modifier,
                    });
                }
            }
        }
        if KEY_RE.is_match(t) {
            return Ok(Operand::Signal {
                name: t.to_string(),
                modifier: SignalModifier::Value,
            });
        }
        Err(ConditionalError::UnrecognizedClause(t.to_string()))
    }

    fn resolve(
        &self,
        ctx: &dyn RunContext,
        default_window: Option<usize>,
    ) -> Option<f64> {
        match self {
            Operand::Signal { name, modifier } => {
                let Some(signal) = ctx.signal(name) else {
                    tracing::warn!(signal = %name, "unknown signal in conditional");
                    return None;
                };
                match modifier {
                    SignalModifier::Value => Some(signal.value),
                    SignalModifier::Current => signal.current(),
                    SignalModifier::Baseline => Some(signal.baseline),
                    SignalModifier::BaselineCorrected => Some(signal.baseline_corrected()),
                    SignalModifier::Deflection => signal.deflection,
                }
            }
            Operand::Call { func, name, window } => {
                let Some(signal) = ctx.signal(name) else {
                    tracing::warn!(signal = %name, "unknown signal in conditional");
                    return None;
                };
                func.apply(signal, window.or(default_window))
            }
            Operand::Age => ctx.age(),
            Operand::Device(name) => ctx.device_value(name),
            Operand::GaugePressure(device) => ctx.gauge_pressure(device),
        }
    }
}

/// Body of one compiled clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    Compare {
        lhs: Operand,
        cmp: Comparator,
        rhs: f64,
    },
    Between {
        arg: Operand,
        low: f64,
        high: f64,
    },
    /// Bare `<detector>.inactive` test against the acquisition block.
    Inactive { name: String },
}

/// One clause with its negation flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledClause {
    pub negate: bool,
    pub kind: ClauseKind,
}

impl CompiledClause {
    pub fn parse(text: &str) -> Result<Self, ConditionalError> {
        let mut s = text.trim();
        if s.is_empty() {
            return Err(ConditionalError::Empty);
        }
        let mut negate = false;
        if let Some(stripped) = s.strip_prefix("not ") {
            negate = true;
            s = stripped.trim_start();
        }
        let kind = Self::parse_kind(s)?;
        Ok(Self { negate, kind })
    }

    fn parse_kind(s: &str) -> Result<ClauseKind, ConditionalError> {
        if let Some(inner) = s.strip_prefix("between(").and_then(|r| r.strip_suffix(')')) {
            let args = split_args(inner);
            let [arg, low, high] = args.as_slice() else {
                return Err(ConditionalError::MalformedBetween(s.to_string()));
            };
            return Ok(ClauseKind::Between {
                arg: Operand::parse(arg)?,
                low: parse_number(low)?,
                high: parse_number(high)?,
            });
        }
        if let Some(m) = COMPARATOR_RE.find(s) {
            let cmp = Comparator::parse(m.as_str())
                .ok_or_else(|| ConditionalError::UnrecognizedClause(s.to_string()))?;
            let lhs = Operand::parse(&s[..m.start()])?;
            let rhs = parse_number(&s[m.end()..])?;
            return Ok(ClauseKind::Compare { lhs, cmp, rhs });
        }
        if let Some(name) = s.strip_suffix(".inactive") {
            if KEY_RE.is_match(name) {
                return Ok(ClauseKind::Inactive {
                    name: name.to_string(),
                });
            }
        }
        Err(ConditionalError::UnrecognizedClause(s.to_string()))
    }

    /// Evaluate the clause. `None` = indeterminate.
    pub fn evaluate(
        &self,
        ctx: &dyn RunContext,
        data: &DataBlock,
        default_window: Option<usize>,
        mapper: Option<&Mapper>,
    ) -> Option<bool> {
        let result = match &self.kind {
            ClauseKind::Compare { lhs, cmp, rhs } => {
                let v = lhs.resolve(ctx, default_window)?;
                let v = apply_mapper(mapper, v)?;
                Some(cmp.apply(v, *rhs))
            }
            ClauseKind::Between { arg, low, high } => {
                let v = arg.resolve(ctx, default_window)?;
                let v = apply_mapper(mapper, v)?;
                Some(*low <= v && v <= *high)
            }
            ClauseKind::Inactive { name } => Some(!data.contains(name)),
        };
        result.map(|b| if self.negate { !b } else { b })
    }
}

fn apply_mapper(mapper: Option<&Mapper>, value: f64) -> Option<f64> {
    match mapper {
        Some(m) => m.apply(value),
        None => Some(value),
    }
}

fn parse_number(text: &str) -> Result<f64, ConditionalError> {
    let t = text.trim();
    t.parse()
        .map_err(|_| ConditionalError::InvalidNumber(t.to_string()))
}

/// Split a call argument list on top-level commas.
fn split_args(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut cur = String::new();
    for ch in s.chars() {
        match ch {
            '(' => {
                depth += 1;
                cur.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                cur.push(ch);
            }
            ',' if depth == 0 => {
                out.push(cur.trim().to_string());
                cur.clear();
            }
            _ => cur.push(ch),
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur.trim().to_string());
    }
    out
}

/// A one-free-variable (`x`) mapping expression applied to the
/// evaluated left-hand value before the comparator, e.g. `x / 1e3`.
/// Compiled once at conditional construction; a malformed mapper
/// rejects the conditional.
pub struct Mapper {
    source: String,
    engine: rhai::Engine,
    ast: rhai::AST,
}

impl Mapper {
    pub fn compile(source: &str) -> Result<Self, ConditionalError> {
        let engine = rhai::Engine::new();
        let ast =
            engine
                .compile_expression(source)
                .map_err(|e| ConditionalError::InvalidMapper {
                    source_text: source.to_string(),
                    message: e.to_string(),
                })?;
        Ok(Self {
            source: source.to_string(),
            engine,
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `x` bound. A runtime failure is indeterminate,
    /// not fatal.
    pub fn apply(&self, x: f64) -> Option<f64> {
        let mut scope = rhai::Scope::new();
        scope.push("x", x);
        match self
            .engine
            .eval_ast_with_scope::<rhai::Dynamic>(&mut scope, &self.ast)
        {
            Ok(v) => v
                .as_float()
                .ok()
                .or_else(|| v.as_int().ok().map(|i| i as f64)),
            Err(err) => {
                tracing::warn!(mapper = %self.source, %err, "mapper evaluation failed");
                None
            }
        }
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper").field("source", &self.source).finish()
    }
}
