use std::fmt;

pub type SmtResult<T> = Result<T, SmtError>;

/// Errors the encoder itself can raise. `keyset_solver::SolverError` wraps
/// `Unknown` as its own `SolverUnknown` (spec §7); the encoder never
/// surfaces `Unknown` without first retrying per-query, so by the time it
/// reaches the caller every reasonable recovery has already been tried.
#[derive(Debug, Clone)]
pub enum SmtError {
    Unknown { reason: String },
    UnsupportedSort { detail: String },
}

impl fmt::Display for SmtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtError::Unknown { reason } => write!(f, "solver returned unknown: {reason}"),
            SmtError::UnsupportedSort { detail } => write!(f, "unsupported sort: {detail}"),
        }
    }
}

impl std::error::Error for SmtError {}
