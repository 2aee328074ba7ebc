//! Error types for the automation engines.
//!
//! Every failure here is synchronous and reported to the caller at
//! construction/parse time; nothing retries. Indeterminate evaluation
//! is *not* an error and is represented as `Option::None` at the call
//! sites instead.

use thiserror::Error;

/// Rejection of a conditional declaration. Raised when the Conditional
/// is constructed, never mid-run.
#[derive(Error, Debug)]
pub enum ConditionalError {
    #[error("empty conditional expression")]
    Empty,

    #[error("unrecognized clause '{0}'")]
    UnrecognizedClause(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("'{func}' expects {expected} argument(s), got {got}")]
    BadArity {
        func: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("invalid numeric literal '{0}'")]
    InvalidNumber(String),

    #[error("malformed between() arguments in '{0}'")]
    MalformedBetween(String),

    #[error("invalid mapper '{source_text}': {message}")]
    InvalidMapper {
        source_text: String,
        message: String,
    },

    #[error("conditionals document: {0}")]
    Document(#[from] serde_yaml::Error),
}

/// Rejection of a frequency template string, caught at
/// configuration-edit time.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("empty frequency template")]
    Empty,

    #[error("empty token in frequency template")]
    EmptyToken,

    #[error("invalid token '{0}' in frequency template")]
    InvalidToken(String),
}

/// Rejection of a hop definition. An invalid hop blocks compiling the
/// whole sequence; a silently mis-configured detector would collect
/// physically meaningless data.
#[derive(Error, Debug)]
pub enum HopError {
    /// Isotope/detector collision inside one hop. The message lists
    /// every offender, e.g. `Multiple Isotopes: Ar40; Multiple
    /// Detectors: H1`.
    #[error("{0}")]
    Conflict(String),

    #[error("hop {index}: {message}")]
    InvalidHop { index: usize, message: String },

    #[error("malformed hop line '{0}'")]
    MalformedLine(String),

    #[error("malformed position '{0}'")]
    MalformedPosition(String),

    #[error("unsupported hop file extension '{0}'")]
    UnsupportedFormat(String),

    #[error("hop document: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
