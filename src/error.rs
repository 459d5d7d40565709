use std::fmt;

/// Errors that can be surfaced by `mumcore`.
///
/// Per the core's error model, only construction-fatal and input-fatal
/// conditions become an `Error`. Conditions that spec.md calls "recoverable"
/// (no matches above `minLen`, no cluster above `minOutputScore`, an
/// extension that fails to reach its target) are reported as empty
/// collections or unfused alignments, never as an `Error`. Debug-only
/// invariant checks use `debug_assert!` and are not part of this type.
#[derive(Debug)]
pub enum Error {
    /// Index construction cannot proceed: sequence too long for the chosen
    /// cell width, inconsistent options, or a similar structural problem.
    Construction(String),
    /// An index file on disk is truncated, inconsistent, or otherwise
    /// cannot be bound into a `SparseSuffixArray`.
    Io(std::io::Error),
    /// A requested option combination is invalid (e.g. `sparseMult * K >
    /// minLen`, or child-table acceleration requested with `K < 4`).
    InvalidOptions(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Construction(msg) => write!(f, "index construction failed: {msg}"),
            Error::Io(err) => write!(f, "index I/O failed: {err}"),
            Error::InvalidOptions(msg) => write!(f, "invalid option combination: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
