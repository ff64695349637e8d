use keyset_base::{SymbolId, SymbolType};
use keyset_logic::Axiom;
use keyset_logic::Expr;
use keyset_logic::Formula;

/// The "solver configuration" external interface (spec §6): the
/// flow-specific data supplied per verified data structure (flow domain,
/// footprint depth, outflow/contents predicates, node/variable
/// invariants). Implemented once per data structure under verification
/// (e.g. a sorted lock-coupling list); the proof engine treats it as an
/// opaque collaborator.
///
/// Simplified to a single implicit node type (one `struct` shape per
/// verified program, e.g. a list cell with `data`/`next`/`lock` fields):
/// every structure this engine targets (spec §1 "singly-linked
/// search-structure operations") has exactly one node shape, so
/// `node_type` in the original's per-type depth table collapses to a
/// single implementor of this trait per program.
pub trait FlowConfig {
    fn flow_value_type(&self) -> SymbolType;

    /// The names of this node's pointer-sorted fields, in the order the
    /// footprint BFS should prefer to expand them.
    fn pointer_fields(&self) -> &[String];

    /// The names of this node's non-pointer fields (e.g. a sorted list's
    /// `data` key, a lock-coupling list's `lock`). `Malloc` (spec §4.G)
    /// needs these to seed every field of a freshly allocated cell with a
    /// fresh unconstrained symbol, not just its pointer fields; a field a
    /// program later writes to but that isn't named here or in
    /// `pointer_fields` never appears in the cell's memory axiom at all,
    /// since the footprint builder only tracks fields already present in
    /// the pre-state (spec §4.E `Node`).
    fn data_fields(&self) -> &[String];

    /// The symbol type a non-pointer field is sorted at, used by `Malloc`
    /// to allocate that field's fresh symbol at the right type (`data`
    /// fields are `Data`-sorted, a lock field is `ThreadId`-sorted, and so
    /// on). Only called for names returned by [`data_fields`](Self::data_fields).
    fn field_type(&self, field: &str) -> SymbolType;

    /// Remaining BFS depth to grow the footprint through `field` (spec
    /// §4.E step 2; the maximum is taken over fields per the spec's
    /// "take the maximum over fields").
    fn max_footprint_depth(&self, field: &str) -> usize;

    /// The formula describing when `value` travels out of `memory` on
    /// `field`. `memory` is a concrete `Axiom::Memory` snapshot (the node's
    /// field bindings at whichever mode — pre or post — the caller is
    /// currently checking), not merely an address: the predicate needs the
    /// field values to decide what flows out.
    fn outflow_contains(&self, memory: &Axiom, field: &str, value: Expr) -> Formula;

    /// The formula describing when `memory` logically contains `value`.
    fn logically_contains(&self, memory: &Axiom, value: Expr) -> Formula;

    fn shared_node_invariant(&self, memory: &Axiom) -> Vec<Formula>;
    fn local_node_invariant(&self, memory: &Axiom) -> Vec<Formula>;

    /// The invariant a shared program variable must satisfy, given its
    /// current value.
    fn shared_variable_invariant(&self, variable: SymbolId, value: Expr) -> Vec<Formula>;
}
