//! Splitting a conditional text into (clause, join) pairs.
//!
//! Clauses are joined by the literal substrings `" and "` / `" or "`,
//! case sensitive, single-space delimited. Evaluation is strictly
//! left to right; there is no precedence beyond the explicit joins.
//! A leading `not ` belongs to the clause, not to the split.

use serde::{Deserialize, Serialize};

/// Boolean join between one clause and the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Join {
    And,
    Or,
}

/// Split `text` into ordered (clause, join) pairs. The final clause's
/// join is always `None`.
///
/// ```
/// use spectro_automation::{tokenize, Join};
///
/// let toks = tokenize("Ar40>50 and age>10");
/// assert_eq!(toks, vec![
///     ("Ar40>50".to_string(), Some(Join::And)),
///     ("age>10".to_string(), None),
/// ]);
/// ```
pub fn tokenize(text: &str) -> Vec<(String, Option<Join>)> {
    const AND: &str = " and ";
    const OR: &str = " or ";

    let mut out = Vec::new();
    let mut rest = text.trim();
    loop {
        let (pos, join, width) = match (rest.find(AND), rest.find(OR)) {
            (Some(a), Some(o)) if a < o => (a, Join::And, AND.len()),
            (Some(a), None) => (a, Join::And, AND.len()),
            (_, Some(o)) => (o, Join::Or, OR.len()),
            (None, None) => break,
        };
        out.push((rest[..pos].trim().to_string(), Some(join)));
        rest = &rest[pos + width..];
    }
    out.push((rest.trim().to_string(), None));
    out
}
