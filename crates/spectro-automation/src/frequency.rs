//! Reference-run scheduling: where in a run list to insert blanks,
//! airs or calibrations.
//!
//! The scheduler never mutates the run list. It returns ascending
//! absolute indices; the caller applies them in *descending* order so
//! earlier indices remain valid, e.g.:
//!
//! ```
//! use spectro_automation::{insertion_indices, RunSpec};
//!
//! let runs: Vec<RunSpec> = (0..10).map(|_| RunSpec::unknown()).collect();
//! let mut queue: Vec<&str> = runs.iter().map(|_| "u").collect();
//! for idx in insertion_indices(&runs, 2, &["unknown"], true, false, 0)
//!     .into_iter()
//!     .rev()
//! {
//!     queue.insert(idx, "blank");
//! }
//! assert_eq!(queue.iter().filter(|r| **r == "blank").count(), 5);
//! ```
//!
//! Two modes:
//!
//! - periodic ([`insertion_indices`]): a boundary at every non-zero
//!   multiple of the cadence, optionally at the start and after the
//!   last counted run;
//! - templated ([`template_insertion_indices`]): batch-aware, driven
//!   by a short [`FrequencyTemplate`] string (`s`, explicit counter
//!   positions, trailing `e`/`E`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// A run as seen by the scheduler.
pub trait QueueRun {
    fn analysis_type(&self) -> &str;
    fn skip(&self) -> bool;
}

/// Minimal concrete run description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    pub analysis_type: String,
    #[serde(default)]
    pub aliquot: u32,
    #[serde(default)]
    pub skip: bool,
}

impl RunSpec {
    pub fn new(analysis_type: impl Into<String>) -> Self {
        Self {
            analysis_type: analysis_type.into(),
            aliquot: 0,
            skip: false,
        }
    }

    pub fn unknown() -> Self {
        Self::new("unknown")
    }

    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }
}

impl QueueRun for RunSpec {
    fn analysis_type(&self) -> &str {
        &self.analysis_type
    }

    fn skip(&self) -> bool {
        self.skip
    }
}

/// Compute the ascending index positions at which a reference run must
/// be inserted.
///
/// Walk `runs`, counting only non-skipped runs whose type is in
/// `target_types`. A boundary falls after every run that brings the
/// counter to a non-zero multiple of `frequency`. `before` adds a
/// boundary at position 0, `after` one immediately after the last
/// counted run; when `after` is not requested a cadence boundary that
/// lands there is dropped (interior-only insertion).
///
/// `sidx` offsets the returned indices when `runs` is a sub-list of
/// the real queue.
pub fn insertion_indices<R: QueueRun>(
    runs: &[R],
    frequency: usize,
    target_types: &[&str],
    before: bool,
    after: bool,
    sidx: usize,
) -> Vec<usize> {
    if frequency == 0 {
        return Vec::new();
    }
    let mut cadence = Vec::new();
    let mut counter = 0usize;
    let mut end = None;
    for (i, run) in runs.iter().enumerate() {
        if run.skip() || !target_types.contains(&run.analysis_type()) {
            continue;
        }
        counter += 1;
        end = Some(sidx + i + 1);
        if counter % frequency == 0 {
            cadence.push(sidx + i + 1);
        }
    }
    // no counted runs: nothing to reference against
    let Some(end) = end else {
        return Vec::new();
    };
    let mut indices = Vec::new();
    if before {
        indices.push(sidx);
    }
    indices.extend(cadence);
    if after {
        indices.push(end);
    } else {
        indices.retain(|&ix| ix != end);
    }
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Parsed frequency template.
///
/// Grammar: optional leading `s` (insert at each batch start),
/// optional trailing `e` or `E` (insert at each batch end; `E` marks
/// the end boundary as exclusive, so an end boundary coinciding with
/// the next batch's start boundary is emitted once), and zero or more
/// comma-separated counter positions in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTemplate {
    pub start: bool,
    pub end: bool,
    pub end_exclusive: bool,
    pub positions: Option<Vec<usize>>,
}

impl FromStr for FrequencyTemplate {
    type Err = TemplateError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TemplateError::Empty);
        }
        let mut tokens: Vec<&str> = text.split(',').map(str::trim).collect();
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(TemplateError::EmptyToken);
        }
        let start = tokens.first() == Some(&"s");
        if start {
            tokens.remove(0);
        }
        let (end, end_exclusive) = match tokens.last() {
            Some(&"e") => (true, false),
            Some(&"E") => (true, true),
            _ => (false, false),
        };
        if end {
            tokens.pop();
        }
        let mut positions = Vec::with_capacity(tokens.len());
        for token in tokens {
            let p: usize = token
                .parse()
                .map_err(|_| TemplateError::InvalidToken(token.to_string()))?;
            positions.push(p);
        }
        Ok(Self {
            start,
            end,
            end_exclusive,
            positions: if positions.is_empty() {
                None
            } else {
                Some(positions)
            },
        })
    }
}

/// True only for a well-formed template string. Validated at
/// configuration-edit time, independent of use.
pub fn validate_frequency_template(text: &str) -> bool {
    text.parse::<FrequencyTemplate>().is_ok()
}

/// A maximal run of consecutive, non-skipped runs sharing one target
/// analysis type. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Batch {
    start: usize,
    end: usize,
}

fn find_batches<R: QueueRun>(runs: &[R], target_types: &[&str]) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current: Option<(usize, &str)> = None;
    for (i, run) in runs.iter().enumerate() {
        let ty = run.analysis_type();
        let counted = !run.skip() && target_types.contains(&ty);
        match current {
            Some((_, current_ty)) if counted && current_ty == ty => {}
            Some((start, _)) => {
                batches.push(Batch { start, end: i });
                current = counted.then_some((i, ty));
            }
            None if counted => current = Some((i, ty)),
            None => {}
        }
    }
    if let Some((start, _)) = current {
        batches.push(Batch {
            start,
            end: runs.len(),
        });
    }
    batches
}

/// Batch-aware templated insertion.
///
/// Each batch independently receives its `s`/`e` boundaries, its
/// explicit counter positions, and (when `frequency` is given) the
/// interior periodic cadence. Coincident boundaries of adjacent
/// batches collapse to a single index.
pub fn template_insertion_indices<R: QueueRun>(
    runs: &[R],
    template: &FrequencyTemplate,
    frequency: Option<usize>,
    target_types: &[&str],
    sidx: usize,
) -> Vec<usize> {
    let batches = find_batches(runs, target_types);
    let mut indices = Vec::new();
    for (bi, batch) in batches.iter().enumerate() {
        if template.start {
            indices.push(batch.start);
        }
        if let Some(positions) = &template.positions {
            for &p in positions {
                if p > 0 && batch.start + p <= batch.end {
                    indices.push(batch.start + p);
                }
            }
        }
        if let Some(freq) = frequency.filter(|f| *f > 0) {
            for offset in 1..(batch.end - batch.start) {
                if offset % freq == 0 {
                    indices.push(batch.start + offset);
                }
            }
        }
        if template.end {
            let next_adjacent = batches
                .get(bi + 1)
                .is_some_and(|next| next.start == batch.end);
            // Exclusive end: the next batch's own start boundary
            // covers the shared position.
            if !(template.end_exclusive && next_adjacent && template.start) {
                indices.push(batch.end);
            }
        }
    }
    indices.sort_unstable();
    indices.dedup();
    indices.into_iter().map(|i| i + sidx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unknowns(n: usize) -> Vec<RunSpec> {
        (0..n).map(|_| RunSpec::unknown()).collect()
    }

    fn apply_insertions(n: usize, indices: &[usize]) -> Vec<&'static str> {
        let mut queue: Vec<&'static str> = vec!["u"; n];
        for &idx in indices.iter().rev() {
            queue.insert(idx, "b");
        }
        queue
    }

    #[test]
    fn test_before_no_after() {
        let runs = unknowns(10);
        let indices = insertion_indices(&runs, 2, &["unknown"], true, false, 0);
        assert_eq!(indices, vec![0, 2, 4, 6, 8]);
        assert_eq!(
            apply_insertions(10, &indices),
            vec!["b", "u", "u", "b", "u", "u", "b", "u", "u", "b", "u", "u", "b", "u", "u"]
        );
    }

    #[test]
    fn test_interior_only() {
        let runs = unknowns(10);
        let indices = insertion_indices(&runs, 2, &["unknown"], false, false, 0);
        assert_eq!(indices, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_before_and_after() {
        let runs = unknowns(4);
        let indices = insertion_indices(&runs, 2, &["unknown"], true, true, 0);
        assert_eq!(indices, vec![0, 2, 4]);
    }

    #[test]
    fn test_skipped_and_foreign_runs_not_counted() {
        let mut runs = unknowns(6);
        runs[2] = RunSpec::unknown().skipped();
        runs[4] = RunSpec::new("air");
        // counted runs are at 0,1,3,5; the counter hits 2 after index
        // 1 and 4 after index 5 (the latter is the end boundary,
        // dropped without `after`)
        let indices = insertion_indices(&runs, 2, &["unknown"], false, false, 0);
        assert_eq!(indices, vec![2]);
    }

    #[test]
    fn test_sublist_offset() {
        let runs = unknowns(4);
        let indices = insertion_indices(&runs, 2, &["unknown"], true, false, 7);
        assert_eq!(indices, vec![7, 9]);
    }

    #[test]
    fn test_no_counted_runs_yields_nothing() {
        // nothing to reference against: no boundaries, even at 0
        let empty: Vec<RunSpec> = Vec::new();
        assert!(insertion_indices(&empty, 2, &["unknown"], true, true, 0).is_empty());

        let skipped: Vec<RunSpec> = (0..3).map(|_| RunSpec::unknown().skipped()).collect();
        assert!(insertion_indices(&skipped, 2, &["unknown"], true, false, 0).is_empty());

        let airs = vec![RunSpec::new("air"), RunSpec::new("air")];
        assert!(insertion_indices(&airs, 2, &["unknown"], true, true, 0).is_empty());
    }

    #[test]
    fn test_zero_frequency_yields_nothing() {
        let runs = unknowns(4);
        assert!(insertion_indices(&runs, 0, &["unknown"], true, true, 0).is_empty());
    }

    #[test]
    fn test_parse_template_full() {
        let t: FrequencyTemplate = "s,3,4,e".parse().unwrap();
        assert_eq!(
            t,
            FrequencyTemplate {
                start: true,
                end: true,
                end_exclusive: false,
                positions: Some(vec![3, 4]),
            }
        );
    }

    #[test]
    fn test_parse_template_exclusive_end() {
        let t: FrequencyTemplate = "s,E".parse().unwrap();
        assert_eq!(
            t,
            FrequencyTemplate {
                start: true,
                end: true,
                end_exclusive: true,
                positions: None,
            }
        );
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_frequency_template("s,e"));
        assert!(validate_frequency_template("2,5"));
        assert!(validate_frequency_template("E"));
        assert!(!validate_frequency_template("s,"));
        assert!(!validate_frequency_template(""));
        assert!(!validate_frequency_template("s,x,e"));
        assert!(!validate_frequency_template(",3"));
    }

    #[test]
    fn test_batches_split_on_type_change() {
        let runs = vec![
            RunSpec::unknown(),
            RunSpec::unknown(),
            RunSpec::new("air"),
            RunSpec::new("air"),
            RunSpec::new("cocktail"),
            RunSpec::unknown(),
        ];
        let batches = find_batches(&runs, &["unknown", "air"]);
        assert_eq!(
            batches,
            vec![
                Batch { start: 0, end: 2 },
                Batch { start: 2, end: 4 },
                Batch { start: 5, end: 6 },
            ]
        );
    }

    #[test]
    fn test_template_start_and_exclusive_end_collapse() {
        let mut runs = unknowns(3);
        runs.extend((0..3).map(|_| RunSpec::new("air")));
        let template: FrequencyTemplate = "s,E".parse().unwrap();
        let indices =
            template_insertion_indices(&runs, &template, None, &["unknown", "air"], 0);
        // batch boundaries at 0/3 and 3/6; the shared boundary at 3 is
        // emitted once
        assert_eq!(indices, vec![0, 3, 6]);
    }

    #[test]
    fn test_template_nonexclusive_end_also_collapses_duplicates() {
        let mut runs = unknowns(3);
        runs.extend((0..3).map(|_| RunSpec::new("air")));
        let template: FrequencyTemplate = "s,e".parse().unwrap();
        let indices =
            template_insertion_indices(&runs, &template, None, &["unknown", "air"], 0);
        assert_eq!(indices, vec![0, 3, 6]);
    }

    #[test]
    fn test_template_explicit_positions() {
        let runs = unknowns(6);
        let template: FrequencyTemplate = "s,3,4,e".parse().unwrap();
        let indices = template_insertion_indices(&runs, &template, None, &["unknown"], 0);
        assert_eq!(indices, vec![0, 3, 4, 6]);
    }

    #[test]
    fn test_template_with_periodic_cadence() {
        let runs = unknowns(6);
        let template: FrequencyTemplate = "s,e".parse().unwrap();
        let indices = template_insertion_indices(&runs, &template, Some(2), &["unknown"], 0);
        assert_eq!(indices, vec![0, 2, 4, 6]);
    }
}
