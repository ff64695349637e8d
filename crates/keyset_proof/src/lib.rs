//! The proof driver (spec §4.L): traverses an interface function's body,
//! threading annotations through the visit rules of every [`keyset_program`]
//! statement, and repeats the sweep over a program's interface functions
//! until the interference pool from `keyset_solver` stops growing.
//!
//! Grounded on `logicaffeine_proof/src/oracle.rs`'s staged-driver shape
//! (see `DESIGN.md`); the fixpoint/traversal algorithm itself is original
//! synthesis from spec §4.L, since no example repo in the retrieval pack
//! contains a program-AST traversal engine to imitate directly.

pub mod driver;
pub mod error;
pub mod macros;
mod linearizability;

pub use driver::{verify_program, VerificationReport};
pub use error::{ProofError, ProofResult};
pub use macros::MacroStrategy;
