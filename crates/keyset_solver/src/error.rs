use std::fmt;

use keyset_base::SymbolId;

pub type SolverResult<T> = Result<T, SolverError>;

/// The nine error kinds of spec §7, each fatal except `SolverUnknown`
/// (which `keyset_smt` retries internally before ever constructing this
/// variant — see `keyset_smt::checker`).
#[derive(Debug, Clone)]
pub enum SolverError {
    ResourceMissing { detail: String },
    UnsafeUpdate { detail: String },
    InvariantViolation { address: SymbolId, detail: String },
    FootprintTooSmall { detail: String },
    CycleInFootprint { root: SymbolId },
    LoopNotStabilising { iterations: u32 },
    UnsupportedConstruct { detail: String },
    SolverUnknown { reason: String },
    InternalInconsistency { detail: String },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::ResourceMissing { detail } => write!(f, "resource missing: {detail}"),
            SolverError::UnsafeUpdate { detail } => write!(f, "unsafe update: {detail}"),
            SolverError::InvariantViolation { address, detail } => {
                write!(f, "invariant violated at {address}: {detail}")
            }
            SolverError::FootprintTooSmall { detail } => write!(f, "footprint too small: {detail}"),
            SolverError::CycleInFootprint { root } => {
                write!(f, "cycle in footprint through root {root}")
            }
            SolverError::LoopNotStabilising { iterations } => {
                write!(f, "loop did not stabilise after {iterations} iterations")
            }
            SolverError::UnsupportedConstruct { detail } => {
                write!(f, "unsupported construct: {detail}")
            }
            SolverError::SolverUnknown { reason } => write!(f, "solver returned unknown: {reason}"),
            SolverError::InternalInconsistency { detail } => {
                write!(f, "internal inconsistency: {detail}")
            }
        }
    }
}

impl std::error::Error for SolverError {}

impl From<keyset_flow::FlowError> for SolverError {
    fn from(e: keyset_flow::FlowError) -> Self {
        match e {
            keyset_flow::FlowError::ResourceMissing { detail, .. } => {
                SolverError::ResourceMissing { detail }
            }
            keyset_flow::FlowError::FootprintTooSmall { detail } => {
                SolverError::FootprintTooSmall { detail }
            }
            keyset_flow::FlowError::CycleInFootprint { root } => SolverError::CycleInFootprint { root },
        }
    }
}

impl From<keyset_program::EvalError> for SolverError {
    fn from(e: keyset_program::EvalError) -> Self {
        SolverError::ResourceMissing { detail: e.to_string() }
    }
}

impl From<keyset_smt::SmtError> for SolverError {
    fn from(e: keyset_smt::SmtError) -> Self {
        match e {
            keyset_smt::SmtError::Unknown { reason } => SolverError::SolverUnknown { reason },
            keyset_smt::SmtError::UnsupportedSort { detail } => {
                SolverError::UnsupportedConstruct { detail }
            }
        }
    }
}
