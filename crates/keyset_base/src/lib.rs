//! Symbol identities shared across the proof engine.
//!
//! Every logic object in `keyset_logic` and every node in `keyset_flow`
//! refers to symbols by [`symbol::SymbolId`] rather than owning a copy of
//! their name or type, so that two occurrences of "the same" symbol really
//! are the same slot in a [`symbol::SymbolFactory`], not merely
//! structurally equal values.
//!
//! # Design principles
//!
//! - Identity, not structure: `SymbolId` equality is slot equality.
//! - Explicit state, not a global: a `SymbolFactory` is owned by whoever
//!   needs fresh symbols (the driver, a footprint builder, the interference
//!   engine) and passed by `&mut`.
//! - Retire and recycle: symbols tied to a dropped annotation can be handed
//!   back to the factory so long-running verification runs don't grow the
//!   table unboundedly.

pub mod error;
pub mod symbol;

pub use error::{BaseError, BaseResult};
pub use symbol::{SymbolFactory, SymbolId, SymbolOrder, SymbolType};
