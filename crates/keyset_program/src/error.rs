use std::fmt;

use keyset_base::SymbolId;

pub type EvalResult<T> = Result<T, EvalError>;

/// `Evaluate` fails exactly one way (spec §4.C): a variable or memory
/// resource it needs is not present in the state.
#[derive(Debug, Clone)]
pub enum EvalError {
    ResourceMissing { symbol: SymbolId, detail: String },
    UnsupportedConstruct { detail: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::ResourceMissing { symbol, detail } => {
                write!(f, "resource missing for symbol {symbol}: {detail}")
            }
            EvalError::UnsupportedConstruct { detail } => {
                write!(f, "unsupported construct in Evaluate: {detail}")
            }
        }
    }
}

impl std::error::Error for EvalError {}
