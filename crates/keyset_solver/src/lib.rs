//! Post-image construction, interference stabilisation, lattice join and
//! past/future predicate maintenance for the krill proof engine (spec §4.F
//! through §4.K). This crate sits between the pure logic layer
//! (`keyset_logic`), the flow-footprint layer (`keyset_flow`) and the SMT
//! encoder (`keyset_smt`) on one side, and the proof driver (`keyset_proof`)
//! on the other: every function here takes a concrete `Annotation` (or a
//! pair of them) and a `FlowConfig` and returns a new concrete `Annotation`,
//! never touching the program AST or the driver's traversal state directly.

pub mod effect_context;
pub mod error;
pub mod future;
pub mod interference;
pub mod join;
pub mod limits;
pub mod past;
pub mod post_other;
pub mod post_write;
pub(crate) mod util;

pub use error::{SolverError, SolverResult};
pub use limits::Limits;

use keyset_logic::{Annotation, HeapEffect};

/// The result of any `Post` rule (spec §4.F/§4.G): the annotation(s) that
/// hold after the command, plus the heap effects a shared write must publish
/// to every other thread's interference set. Most rules produce exactly one
/// annotation; `Assume` can produce several (one per surviving branch) or
/// none (a dead path), and both carry no effects since only a write to
/// shared memory has one.
pub struct PostImage {
    pub annotations: Vec<Annotation>,
    pub effects: Vec<HeapEffect>,
}

impl PostImage {
    pub fn single(annotation: Annotation) -> Self {
        Self {
            annotations: vec![annotation],
            effects: Vec::new(),
        }
    }
}
