use std::fmt;

use keyset_solver::SolverError;

pub type ProofResult<T> = Result<T, ProofError>;

/// Failures the proof driver itself can raise, on top of what a single
/// `Post`, `Join`, or interference step already covers via [`SolverError`].
#[derive(Debug, Clone)]
pub enum ProofError {
    Solver(SolverError),
    /// A `Fail` statement was reached on a satisfiable path.
    ReachedFail,
    /// A `Return` left no `Fulfillment` matching the function's declared
    /// specification, on a satisfiable path (spec §4.L "linearizability
    /// check").
    Unfulfilled { function: String },
    /// `Call` named a function the driver was not given.
    UnknownMacro { name: String },
    /// A macro call nested past the non-recursive-call assumption (spec
    /// §4.L "Macros (non-recursive calls)").
    RecursiveMacro { name: String },
    /// The outer sweep over interface functions never reached a fixed point
    /// on the interference pool.
    InterferenceNotStabilising { sweeps: u32 },
    UnsupportedConstruct { detail: String },
}

impl fmt::Display for ProofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofError::Solver(e) => write!(f, "{e}"),
            ProofError::ReachedFail => write!(f, "a Fail statement was reached on a satisfiable path"),
            ProofError::Unfulfilled { function } => {
                write!(f, "function `{function}` returns without discharging its specification")
            }
            ProofError::UnknownMacro { name } => write!(f, "call to undeclared function `{name}`"),
            ProofError::RecursiveMacro { name } => {
                write!(f, "macro `{name}` recursed past the non-recursive-call assumption")
            }
            ProofError::InterferenceNotStabilising { sweeps } => {
                write!(f, "interference pool did not stabilise after {sweeps} sweeps over every interface function")
            }
            ProofError::UnsupportedConstruct { detail } => write!(f, "unsupported construct: {detail}"),
        }
    }
}

impl std::error::Error for ProofError {}

impl From<SolverError> for ProofError {
    fn from(e: SolverError) -> Self {
        ProofError::Solver(e)
    }
}

impl From<keyset_program::EvalError> for ProofError {
    fn from(e: keyset_program::EvalError) -> Self {
        ProofError::Solver(SolverError::from(e))
    }
}
