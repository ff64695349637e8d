use std::collections::BTreeMap;

use keyset_base::SymbolId;

use crate::expr::Expr;

/// Relational operator of a [`Axiom::Stack`] comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackOp {
    Eq,
    Neq,
    Leq,
    Lt,
    Geq,
    Gt,
}

/// Whether a memory resource is visible to the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    /// Owned by the current thread, not visible outside an atomic block.
    Local,
    /// Visible to other threads; subject to interference and stability.
    Shared,
}

/// The specification kind an obligation/fulfillment pair tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecKind {
    Contains,
    Insert,
    Delete,
}

/// An atomic formula (spec §3 "Axiom").
///
/// `Memory` fields are stored as a sorted map from field name to the
/// expression giving that field's current value, so that two memory axioms
/// over the same fields compare equal regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Axiom {
    Stack {
        op: StackOp,
        lhs: Expr,
        rhs: Expr,
    },
    InflowEmptiness {
        flow: SymbolId,
        is_empty: bool,
    },
    InflowContainsValue {
        flow: SymbolId,
        value: Expr,
    },
    InflowContainsRange {
        flow: SymbolId,
        lo: Expr,
        hi: Expr,
    },
    /// The *variable resource*: `programVar` currently holds `value`.
    EqualsTo {
        program_var: SymbolId,
        value: Expr,
    },
    Memory {
        address: SymbolId,
        flow: SymbolId,
        fields: BTreeMap<String, Expr>,
        locality: Locality,
    },
    Obligation {
        spec: SpecKind,
        key: SymbolId,
    },
    Fulfillment {
        return_value: Expr,
    },
}

impl Axiom {
    pub fn stack(op: StackOp, lhs: Expr, rhs: Expr) -> Self {
        Axiom::Stack { op, lhs, rhs }
    }

    pub fn memory(
        address: SymbolId,
        flow: SymbolId,
        fields: BTreeMap<String, Expr>,
        locality: Locality,
    ) -> Self {
        Axiom::Memory {
            address,
            flow,
            fields,
            locality,
        }
    }

    /// The address this axiom is anchored at, for axioms that have one.
    pub fn address(&self) -> Option<SymbolId> {
        match self {
            Axiom::Memory { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn is_shared_memory(&self) -> bool {
        matches!(
            self,
            Axiom::Memory {
                locality: Locality::Shared,
                ..
            }
        )
    }

    pub fn is_local_memory(&self) -> bool {
        matches!(
            self,
            Axiom::Memory {
                locality: Locality::Local,
                ..
            }
        )
    }

    /// Returns the `(address, flow, fields, locality)` of a memory axiom,
    /// or `None` for any other variant.
    pub fn as_memory(&self) -> Option<(SymbolId, SymbolId, &BTreeMap<String, Expr>, Locality)> {
        match self {
            Axiom::Memory {
                address,
                flow,
                fields,
                locality,
            } => Some((*address, *flow, fields, *locality)),
            _ => None,
        }
    }
}
