use std::fmt;

/// Shared result alias for crates that only ever fail with a plain message
/// (mirrors `logicaffeine_base`'s `SpannedError`/`Result` pair, minus the
/// span since symbols in this system have no source location of their own).
pub type BaseResult<T> = Result<T, BaseError>;

#[derive(Debug, Clone)]
pub struct BaseError {
    pub message: String,
}

impl BaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BaseError {}
