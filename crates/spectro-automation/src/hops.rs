//! Hop-sequence compilation: turning a compact description of magnet
//! hops into a validated, executable measurement plan.
//!
//! A [`Hop`] is one magnet/detector configuration step: an ordered set
//! of [`Position`]s (isotope on detector, optional deflection), a
//! number of counts to integrate and a settle time after the magnet
//! repositions. A [`HopSequence`] is the ordered list of hops executed
//! once per cycle; `ncycles` repetition is the caller's concern (the
//! sequence is a plain collection and can be re-iterated).
//!
//! Two external formats are normalized into the same model:
//!
//! - the legacy line-oriented text format, one parenthesized
//!   `('Ar40:H1, Ar39:AX', counts, settle)` literal per non-comment
//!   line, with `bs:<mass>:<detector>` marking a baseline position;
//! - a structured YAML document per hop with explicit
//!   `cup_configuration` entries.
//!
//! Inside the model a baseline position is an explicit boolean field;
//! the `bs:` string convention exists only at the parsing/formatting
//! boundary.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HopError;

/// One detector assignment within a hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Isotope name, or the fixed mass when `is_baseline` is set.
    pub isotope: String,
    pub detector: String,
    #[serde(default)]
    pub deflection: Option<f64>,
    /// Measure at a fixed mass as a baseline, not an isotope peak.
    #[serde(default)]
    pub is_baseline: bool,
    /// Apply the detector's protective deflection while the magnet
    /// moves. Parsed from the structured format; the executor acts on
    /// it.
    #[serde(default)]
    pub protect: bool,
}

impl Position {
    pub fn new(isotope: impl Into<String>, detector: impl Into<String>) -> Self {
        Self {
            isotope: isotope.into(),
            detector: detector.into(),
            deflection: None,
            is_baseline: false,
            protect: false,
        }
    }

    #[must_use]
    pub fn with_deflection(mut self, deflection: f64) -> Self {
        self.deflection = Some(deflection);
        self
    }

    #[must_use]
    pub fn baseline(mut self) -> Self {
        self.is_baseline = true;
        self
    }

    /// Parse one `ISO:DET[:DEFL]` / `bs:MASS:DET` token.
    fn parse(token: &str) -> Result<Self, HopError> {
        let parts: Vec<&str> = token.split(':').map(str::trim).collect();
        match parts.as_slice() {
            ["bs", mass, det] if !mass.is_empty() && !det.is_empty() => Ok(Self {
                isotope: (*mass).to_string(),
                detector: (*det).to_string(),
                deflection: None,
                is_baseline: true,
                protect: false,
            }),
            [iso, det] if !iso.is_empty() && !det.is_empty() => {
                Ok(Self::new(*iso, *det))
            }
            [iso, det, defl] if !iso.is_empty() && !det.is_empty() => {
                let deflection: f64 = defl
                    .parse()
                    .map_err(|_| HopError::MalformedPosition(token.to_string()))?;
                Ok(Self::new(*iso, *det).with_deflection(deflection))
            }
            _ => Err(HopError::MalformedPosition(token.to_string())),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_baseline {
            write!(f, "bs:{}:{}", self.isotope, self.detector)
        } else {
            write!(f, "{}:{}", self.isotope, self.detector)?;
            if let Some(deflection) = self.deflection {
                write!(f, ":{deflection}")?;
            }
            Ok(())
        }
    }
}

/// One magnet-stepping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub positions: Vec<Position>,
    pub counts: u32,
    pub settle: f64,
}

impl Hop {
    pub fn new(positions: Vec<Position>, counts: u32, settle: f64) -> Self {
        Self {
            positions,
            counts,
            settle,
        }
    }

    /// A hop cannot ask one detector to read two isotopes at once, nor
    /// place one isotope on two detectors. The error message lists
    /// every offender.
    pub fn validate(&self) -> Result<(), HopError> {
        let dup_isotopes = duplicated(self.positions.iter().map(|p| p.isotope.as_str()));
        let dup_detectors = duplicated(self.positions.iter().map(|p| p.detector.as_str()));
        let mut messages = Vec::new();
        if !dup_isotopes.is_empty() {
            messages.push(format!("Multiple Isotopes: {}", dup_isotopes.join(", ")));
        }
        if !dup_detectors.is_empty() {
            messages.push(format!("Multiple Detectors: {}", dup_detectors.join(", ")));
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(HopError::Conflict(messages.join("; ")))
        }
    }

    /// Parse either the parenthesized tuple form produced by
    /// `Display`, or the legacy bare positions form (arbitrary
    /// interior whitespace, default counts/settle).
    pub fn parse(text: &str) -> Result<Self, HopError> {
        let t = text.trim();
        if let Some(inner) = t.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            let (positions_str, rest) = extract_quoted(inner)
                .ok_or_else(|| HopError::MalformedLine(t.to_string()))?;
            let fields: Vec<&str> = rest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            let [counts, settle] = fields.as_slice() else {
                return Err(HopError::MalformedLine(t.to_string()));
            };
            let counts: u32 = counts
                .parse()
                .map_err(|_| HopError::MalformedLine(t.to_string()))?;
            let settle: f64 = settle
                .parse()
                .map_err(|_| HopError::MalformedLine(t.to_string()))?;
            Ok(Self::new(parse_positions(positions_str)?, counts, settle))
        } else {
            Ok(Self::new(parse_positions(t)?, 1, 0.0))
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions = self
            .positions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "('{}', {}, {})", positions, self.counts, self.settle)
    }
}

fn parse_positions(text: &str) -> Result<Vec<Position>, HopError> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Position::parse)
        .collect()
}

/// Names appearing on more than one position, in first-collision
/// order, each listed once.
fn duplicated<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut dups: Vec<String> = Vec::new();
    for name in names {
        if seen.contains(&name) {
            if !dups.iter().any(|d| d == name) {
                dups.push(name.to_string());
            }
        } else {
            seen.push(name);
        }
    }
    dups
}

/// The quoted segment of a tuple body and whatever follows it.
fn extract_quoted(s: &str) -> Option<(&str, &str)> {
    let start = s.find(['\'', '"'])?;
    let quote = s[start..].chars().next()?;
    let rest = &s[start + 1..];
    let end = rest.find(quote)?;
    Some((&rest[..end], &rest[end + 1..]))
}

/// Ordered, restartable list of hops; one magnet reposition per hop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HopSequence {
    pub hops: Vec<Hop>,
}

/// Structured-format cup configuration entry.
#[derive(Debug, Clone, Deserialize)]
struct CupConfiguration {
    isotope: String,
    detector: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    deflection: Option<f64>,
    #[serde(default)]
    protect: bool,
    #[serde(default)]
    is_baseline: bool,
}

fn default_active() -> bool {
    true
}

/// Structured-format hop document.
#[derive(Debug, Clone, Deserialize)]
struct HopDoc {
    cup_configuration: Vec<CupConfiguration>,
    counts: u32,
    #[serde(default)]
    settle: f64,
}

impl From<HopDoc> for Hop {
    fn from(doc: HopDoc) -> Self {
        let positions = doc
            .cup_configuration
            .into_iter()
            .filter(|cup| cup.active)
            .map(|cup| Position {
                isotope: cup.isotope,
                detector: cup.detector,
                deflection: cup.deflection,
                is_baseline: cup.is_baseline,
                protect: cup.protect,
            })
            .collect();
        Hop::new(positions, doc.counts, doc.settle)
    }
}

impl HopSequence {
    pub fn new(hops: Vec<Hop>) -> Self {
        Self { hops }
    }

    /// Compile the legacy line-oriented format. Empty lines and `#`
    /// comments are skipped; any invalid hop blocks the sequence.
    pub fn from_legacy(text: &str) -> Result<Self, HopError> {
        let mut hops = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            hops.push(Hop::parse(line)?);
        }
        let seq = Self::new(hops);
        seq.validate()?;
        Ok(seq)
    }

    /// Compile the structured YAML format (a list of hop documents
    /// with `cup_configuration` entries). Inactive cups are dropped;
    /// any invalid hop blocks the sequence.
    pub fn from_yaml(text: &str) -> Result<Self, HopError> {
        let docs: Vec<HopDoc> = serde_yaml::from_str(text)?;
        let seq = Self::new(docs.into_iter().map(Hop::from).collect());
        seq.validate()?;
        Ok(seq)
    }

    /// Load a hop file, picking the format from the extension
    /// (`.yaml`/`.yml` structured, `.txt`/`.hop`/`.hops` legacy).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HopError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let seq = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&text),
            Some("txt" | "hop" | "hops") | None => Self::from_legacy(&text),
            Some(other) => Err(HopError::UnsupportedFormat(other.to_string())),
        }?;
        tracing::debug!(path = %path.display(), hops = seq.len(), "loaded hop sequence");
        Ok(seq)
    }

    /// Validate every hop; the first collision blocks compilation.
    pub fn validate(&self) -> Result<(), HopError> {
        for (index, hop) in self.hops.iter().enumerate() {
            hop.validate().map_err(|e| HopError::InvalidHop {
                index,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hop> {
        self.hops.iter()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

impl fmt::Display for HopSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in &self.hops {
            writeln!(f, "{hop}")?;
        }
        Ok(())
    }
}

/// Per-hop record handed to the data collector, parallel arrays in
/// position order.
#[derive(Debug, Clone, PartialEq)]
pub struct HopRecord {
    pub isotopes: Vec<String>,
    pub detectors: Vec<String>,
    pub counts: u32,
    pub settle: f64,
    pub is_baselines: Vec<bool>,
}

/// Lazily produce one record per hop, in hop order. The iterator is
/// finite and single-pass; for `ncycles` repetition re-iterate the
/// sequence itself.
pub fn generate_hops(sequence: &HopSequence) -> impl Iterator<Item = HopRecord> + '_ {
    sequence.iter().map(|hop| HopRecord {
        isotopes: hop.positions.iter().map(|p| p.isotope.clone()).collect(),
        detectors: hop.positions.iter().map(|p| p.detector.clone()).collect(),
        counts: hop.counts,
        settle: hop.settle,
        is_baselines: hop.positions.iter().map(|p| p.is_baseline).collect(),
    })
}
