//! Z3-backed encoding and batched implication checking (spec §4.D).
//!
//! This is the only crate in the workspace that talks to Z3 directly;
//! every other crate reasons about [`keyset_logic`] terms and calls into
//! this crate's [`Encoder`] and [`checker`] functions to discharge a
//! concrete SMT query.

pub mod checker;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod scope;

pub use checker::{implies, Implied, ImplicationBatch};
pub use encoder::Encoder;
pub use error::{SmtError, SmtResult};
pub use scope::ScopeGuard;
