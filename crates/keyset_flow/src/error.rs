use std::fmt;

use keyset_base::SymbolId;

pub type FlowResult<T> = Result<T, FlowError>;

/// Errors the footprint builder itself can raise. `FootprintTooSmall` and
/// `CycleInFootprint` reappear verbatim as `keyset_solver::SolverError`
/// variants (spec §7); this crate's own error type exists so `keyset_flow`
/// doesn't need to depend on `keyset_solver` to report them.
#[derive(Debug, Clone)]
pub enum FlowError {
    ResourceMissing { symbol: SymbolId, detail: String },
    FootprintTooSmall { detail: String },
    CycleInFootprint { root: SymbolId },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::ResourceMissing { symbol, detail } => {
                write!(f, "resource missing for {symbol} while building footprint: {detail}")
            }
            FlowError::FootprintTooSmall { detail } => write!(f, "footprint too small: {detail}"),
            FlowError::CycleInFootprint { root } => {
                write!(f, "footprint has an incoming edge to root {root}")
            }
        }
    }
}

impl std::error::Error for FlowError {}
