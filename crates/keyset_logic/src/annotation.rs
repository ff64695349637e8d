use keyset_base::SymbolId;

use crate::axiom::Axiom;
use crate::formula::Formula;

/// Asserts that the memory at `memory.address()` once had the given field
/// values and flow (spec §3 "PastPredicate"). `memory` is always an
/// `Axiom::Memory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastPredicate {
    pub memory: Axiom,
}

impl PastPredicate {
    pub fn new(memory: Axiom) -> Self {
        debug_assert!(memory.as_memory().is_some());
        Self { memory }
    }

    pub fn address(&self) -> SymbolId {
        self.memory.address().expect("PastPredicate wraps a Memory axiom")
    }
}

/// One field update that a future predicate asserts will eventually happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub address: SymbolId,
    pub field: String,
    pub value: crate::expr::Expr,
}

/// Asserts that somewhere along every future execution a state is reached
/// in which `guard` holds and every listed field update has been performed
/// (spec §3 "FuturePredicate").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuturePredicate {
    pub update: Vec<FieldUpdate>,
    pub guard: Formula,
}

/// The unit of symbolic state the proof driver carries between commands
/// (spec §3 "Annotation").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub now: Formula,
    pub past: Vec<PastPredicate>,
    pub future: Vec<FuturePredicate>,
}

impl Annotation {
    pub fn new(now: Formula) -> Self {
        Self {
            now,
            past: Vec::new(),
            future: Vec::new(),
        }
    }

    pub fn with_past(mut self, past: Vec<PastPredicate>) -> Self {
        self.past = past;
        self
    }

    pub fn with_future(mut self, future: Vec<FuturePredicate>) -> Self {
        self.future = future;
        self
    }
}
