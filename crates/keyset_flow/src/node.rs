use std::collections::BTreeMap;

use keyset_base::SymbolId;
use keyset_logic::{Axiom, Expr, Locality};

/// A pointer field's flow bookkeeping (spec §4.E `Node`): the pre/post
/// values plus, for every mode, the flow that travels out of the node on
/// this field split into the portion flowing into the whole graph
/// (`all_outflow`) and the portion flowing specifically to the node's
/// current root-relative successor (`root_outflow`).
///
/// Grounded on `examples/original_source/src/solver/default/flowgraph.hpp`'s
/// `solver::Field`, translated from raw pre/post C++ members into an owned
/// Rust struct with `SymbolId` handles instead of raw flow pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerField {
    pub name: String,
    pub pre_value: Expr,
    pub post_value: Expr,
    pub pre_all_outflow: SymbolId,
    pub pre_root_outflow: SymbolId,
    pub post_all_outflow: SymbolId,
    pub post_root_outflow: SymbolId,
}

/// One node of a [`crate::graph::FlowGraph`] (spec §4.E `Node`).
///
/// `needed` tracks whether a check in post-image processing (spec §4.F)
/// has marked this node as required in the final, minimised footprint;
/// `pre_local`/`post_local` track whether the node is owned (not visible
/// to the environment) before/after the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub address: SymbolId,
    pub needed: bool,
    pub pre_local: bool,
    pub post_local: bool,
    pub pre_all_inflow: SymbolId,
    pub pre_root_inflow: SymbolId,
    pub pre_keyset: SymbolId,
    pub post_all_inflow: SymbolId,
    pub post_root_inflow: SymbolId,
    pub post_keyset: SymbolId,
    /// The inflow this node receives from outside the footprint, held
    /// fixed across the update (spec §4.E step 1: "Root's post-inflow
    /// equals its pre-inflow").
    pub frame_inflow: SymbolId,
    pub data_fields: BTreeMap<String, (Expr, Expr)>,
    pub pointer_fields: BTreeMap<String, PointerField>,
}

impl Node {
    pub fn publishes(&self) -> bool {
        self.pre_local && !self.post_local
    }

    pub fn unpublishes(&self) -> bool {
        !self.pre_local && self.post_local
    }

    pub fn pointer_successors(&self, pre: bool) -> Vec<Expr> {
        self.pointer_fields
            .values()
            .map(|f| if pre { f.pre_value } else { f.post_value })
            .collect()
    }

    pub fn field_changed(&self, field: &str) -> bool {
        if let Some((pre, post)) = self.data_fields.get(field) {
            return pre != post;
        }
        if let Some(pf) = self.pointer_fields.get(field) {
            return pf.pre_value != pf.post_value;
        }
        false
    }

    pub fn any_field_changed(&self) -> bool {
        self.data_fields.keys().any(|f| self.field_changed(f))
            || self.pointer_fields.keys().any(|f| self.field_changed(f))
            || self.pre_all_inflow != self.post_all_inflow
            || self.pre_keyset != self.post_keyset
            || self.pre_local != self.post_local
    }

    /// Reconstructs this node's `Axiom::Memory` snapshot at the given mode,
    /// for handing to a [`crate::config::FlowConfig`] predicate that needs
    /// concrete field bindings rather than just an address.
    pub fn memory_axiom(&self, pre: bool) -> Axiom {
        let mut fields = BTreeMap::new();
        for (name, (pre_value, post_value)) in &self.data_fields {
            fields.insert(name.clone(), if pre { *pre_value } else { *post_value });
        }
        for (name, field) in &self.pointer_fields {
            fields.insert(name.clone(), if pre { field.pre_value } else { field.post_value });
        }
        let flow = if pre { self.pre_all_inflow } else { self.post_all_inflow };
        let locality = if pre {
            if self.pre_local { Locality::Local } else { Locality::Shared }
        } else if self.post_local {
            Locality::Local
        } else {
            Locality::Shared
        };
        Axiom::memory(self.address, flow, fields, locality)
    }
}
