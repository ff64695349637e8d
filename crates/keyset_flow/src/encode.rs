//! Node/graph-aware SMT helpers (spec §4.D `EncodeInvariants`,
//! `EncodeSimpleFlowRules`, `EncodeAcyclicity`, `EncodeNodeInvariant`,
//! `EncodeIsPure`, `EncodeContainsKey`, `EncodeNotContainsKey`,
//! `EncodeIsInsertion`, `EncodeIsDeletion`).
//!
//! These live here rather than in `keyset_smt` because they need
//! [`FlowConfig`] and [`FlowGraph`]/[`Node`], which `keyset_smt` —
//! deliberately the only crate that talks to Z3 directly but otherwise
//! logic-only — does not and should not depend on. Every function below
//! is built on top of `keyset_smt::Encoder`'s generic primitives.

use keyset_base::{SymbolFactory, SymbolId, SymbolType};
use keyset_logic::Expr;
use keyset_smt::Encoder;
use z3::ast::{Ast, Bool};

use crate::config::FlowConfig;
use crate::graph::FlowGraph;
use crate::node::{Node, PointerField};

/// `EncodeNodeInvariant(memory)`: the local or shared node invariant
/// (chosen by the node's locality at `pre`/`post`) applied to this node's
/// field snapshot at that mode.
pub fn encode_node_invariant<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    node: &Node,
    pre: bool,
) -> Bool<'ctx> {
    let memory = node.memory_axiom(pre);
    let is_local = if pre { node.pre_local } else { node.post_local };
    let invariants = if is_local {
        config.local_node_invariant(&memory)
    } else {
        config.shared_node_invariant(&memory)
    };
    let encoded: Vec<Bool<'ctx>> = invariants.iter().map(|f| encoder.encode_formula(f)).collect();
    let refs: Vec<&Bool<'ctx>> = encoded.iter().collect();
    Bool::and(encoder.context(), &refs)
}

/// `EncodeInvariants(state, config)`: the conjunction of every footprint
/// node's invariant at the given mode.
pub fn encode_invariants<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    pre: bool,
) -> Bool<'ctx> {
    let encoded: Vec<Bool<'ctx>> = graph
        .nodes
        .iter()
        .map(|n| encode_node_invariant(encoder, config, n, pre))
        .collect();
    let refs: Vec<&Bool<'ctx>> = encoded.iter().collect();
    Bool::and(encoder.context(), &refs)
}

/// `EncodeFlowRules` (node-level half, spec §4.F items 3-4's structural
/// backbone): a node's all-inflow is exactly the union of its root-inflow
/// (whatever arrives via footprint-internal edges) and its frame-inflow
/// (whatever arrives from outside the footprint, held fixed across the
/// update), and its keyset is exactly that inflow minus whatever its
/// pointer fields route back out. Grounded on
/// `examples/original_source/src/solver/default/flowgraph.cpp`'s
/// `EncodeFlowRules` (its `preGraph`/`postGraph` is this module's
/// `root_inflow`; its `preAll`/`postAll` is `all_inflow`).
fn encode_node_flow_rules<'ctx, 'a>(encoder: &mut Encoder<'ctx, 'a>, node: &Node) -> Bool<'ctx> {
    let mut clauses = Vec::new();
    let frame = node.frame_inflow;
    for (all_inflow, root_inflow, keyset, all_outflows) in [
        (
            node.pre_all_inflow,
            node.pre_root_inflow,
            node.pre_keyset,
            node.pointer_fields.values().map(|f| f.pre_all_outflow).collect::<Vec<_>>(),
        ),
        (
            node.post_all_inflow,
            node.post_root_inflow,
            node.post_keyset,
            node.pointer_fields.values().map(|f| f.post_all_outflow).collect::<Vec<_>>(),
        ),
    ] {
        // root inflow and frame inflow are each subsets of all-inflow...
        clauses.push(encoder.encode_for_all(move |enc, v| {
            enc.flow_contains_pub(root_inflow, v.clone()).implies(&enc.flow_contains_pub(all_inflow, v))
        }));
        clauses.push(encoder.encode_for_all(move |enc, v| {
            enc.flow_contains_pub(frame, v.clone()).implies(&enc.flow_contains_pub(all_inflow, v))
        }));
        // ...and all-inflow is nothing but their union.
        clauses.push(encoder.encode_for_all(move |enc, v| {
            let root_or_frame = Bool::or(
                enc.context(),
                &[&enc.flow_contains_pub(root_inflow, v.clone()), &enc.flow_contains_pub(frame, v.clone())],
            );
            enc.flow_contains_pub(all_inflow, v).implies(&root_or_frame)
        }));
        // keyset is exactly inflow minus whatever any pointer field routes out.
        let outflows = all_outflows;
        clauses.push(encoder.encode_for_all(move |enc, v| {
            let routed_out = if outflows.is_empty() {
                Bool::from_bool(enc.context(), false)
            } else {
                let members: Vec<Bool<'ctx>> = outflows.iter().map(|&o| enc.flow_contains_pub(o, v.clone())).collect();
                let refs: Vec<&Bool<'ctx>> = members.iter().collect();
                Bool::or(enc.context(), &refs)
            };
            let in_keyset_should_be = Bool::and(enc.context(), &[&enc.flow_contains_pub(all_inflow, v.clone()), &routed_out.not()]);
            in_keyset_should_be._eq(&enc.flow_contains_pub(keyset, v))
        }));
    }
    let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
    Bool::and(encoder.context(), &refs)
}

/// `EncodeOutflow`/`EncodeNodeOutflow` (field-level half, spec §4.D/§4.F
/// items 3-5): a pointer field's outflow is exactly the inflow values the
/// config's `outflow_contains` predicate says travel out on that field,
/// and whatever leaves on it is received as inflow by whichever footprint
/// node that field's value currently points at — the edge-propagation rule
/// the pre-fix encoder never asserted at all. Grounded on flowgraph.cpp's
/// `EncodeOutflow` (derivation + propagation into a successor's
/// `preGraphInflow`/`preAllInflow`) and `EncodeNodeOutflow`/`EncodePredicate`
/// (binding a config predicate's own dummy argument to the quantifier's
/// bound variable via [`Encoder::encode_for_all_symbol`]).
fn encode_field_flow<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    node: &Node,
    field: &PointerField,
    dummy: SymbolId,
    pre: bool,
) -> Bool<'ctx> {
    let (all_inflow, root_inflow, all_outflow, root_outflow, successor_expr) = if pre {
        (node.pre_all_inflow, node.pre_root_inflow, field.pre_all_outflow, field.pre_root_outflow, field.pre_value)
    } else {
        (node.post_all_inflow, node.post_root_inflow, field.post_all_outflow, field.post_root_outflow, field.post_value)
    };

    let memory = node.memory_axiom(pre);
    let predicate = config.outflow_contains(&memory, &field.name, Expr::variable(dummy));
    let derivation = encoder.encode_for_all_symbol(dummy, |enc| {
        let v = enc.symbol_const(dummy).as_int().expect("flow values encode to Int");
        let routed = enc.encode_formula(&predicate);
        let all_rule = {
            let should_be_out = Bool::and(enc.context(), &[&enc.flow_contains_pub(all_inflow, v.clone()), &routed]);
            should_be_out._eq(&enc.flow_contains_pub(all_outflow, v.clone()))
        };
        let root_rule = {
            let should_be_out = Bool::and(enc.context(), &[&enc.flow_contains_pub(root_inflow, v.clone()), &routed]);
            should_be_out._eq(&enc.flow_contains_pub(root_outflow, v))
        };
        Bool::and(enc.context(), &[&all_rule, &root_rule])
    });

    let mut clauses = vec![derivation];
    if let Some(successor) = successor_expr.symbol().and_then(|s| graph.node(s)) {
        let (succ_all_in, succ_root_in) = if pre {
            (successor.pre_all_inflow, successor.pre_root_inflow)
        } else {
            (successor.post_all_inflow, successor.post_root_inflow)
        };
        clauses.push(encoder.encode_for_all(move |enc, v| {
            enc.flow_contains_pub(all_outflow, v.clone()).implies(&enc.flow_contains_pub(succ_all_in, v))
        }));
        clauses.push(encoder.encode_for_all(move |enc, v| {
            enc.flow_contains_pub(root_outflow, v.clone()).implies(&enc.flow_contains_pub(succ_root_in, v))
        }));
    }
    let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
    Bool::and(encoder.context(), &refs)
}

/// `EncodeSimpleFlowRules`: the conjunction of [`encode_node_flow_rules`]
/// and [`encode_field_flow`] over every node and pointer field of the
/// footprint, at both modes — the full flow-conservation law a footprint
/// must satisfy for "flow coverage" and "keyset disjointness" (spec §4.F
/// items 3-4) to mean anything.
pub fn encode_simple_flow_rules<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    dummy: SymbolId,
) -> Bool<'ctx> {
    let mut clauses = Vec::new();
    for node in &graph.nodes {
        clauses.push(encode_node_flow_rules(encoder, node));
        for field in node.pointer_fields.values() {
            clauses.push(encode_field_flow(encoder, config, graph, node, field, dummy, true));
            clauses.push(encode_field_flow(encoder, config, graph, node, field, dummy, false));
        }
    }
    let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
    Bool::and(encoder.context(), &refs)
}

/// `EncodeAcyclicity`: no footprint node is its own post-reachable
/// successor. Computed structurally over the footprint's explicit
/// pointer-successor edges (addresses are distinct symbols, and
/// `EncodeOwnership` elsewhere asserts that distinctness at the SMT level,
/// so a syntactic reachability check over this small, bounded graph is
/// sound) rather than as a quantified SMT formula.
pub fn is_acyclic(graph: &FlowGraph, post: bool) -> bool {
    fn reaches(graph: &FlowGraph, from: SymbolId, target: SymbolId, post: bool, seen: &mut Vec<SymbolId>) -> bool {
        if seen.contains(&from) {
            return false;
        }
        seen.push(from);
        let Some(node) = graph.node(from) else { return false };
        for succ in node.pointer_successors(post) {
            let Some(succ_id) = succ.symbol() else { continue };
            if succ_id == target {
                return true;
            }
            if graph.contains(succ_id) && reaches(graph, succ_id, target, post, seen) {
                return true;
            }
        }
        false
    }

    graph.nodes.iter().all(|n| {
        let mut seen = Vec::new();
        !reaches(graph, n.address, n.address, post, &mut seen)
    })
}

/// Allocates a fresh data-sorted symbol standing in for a
/// universally/existentially quantified key, used to encode config
/// predicates (which are expressed over a concrete `Expr`, not a bound
/// variable) inside a genuine SMT quantifier via
/// `Encoder::encode_for_all_symbol`. Callers must allocate this *before*
/// constructing the `Encoder` that will borrow the same factory
/// immutably — see `keyset_solver::post::write` for the call order.
pub fn fresh_probe(factory: &mut SymbolFactory) -> SymbolId {
    factory.fresh(SymbolType::Data)
}

/// A second dummy argument, sorted at the flow domain's own value type
/// rather than hardcoded to `Data`, for [`encode_field_flow`]'s quantifier
/// over `FlowConfig::outflow_contains`'s argument. Allocate before
/// constructing the `Encoder`, same as [`fresh_probe`].
pub fn fresh_flow_probe(factory: &mut SymbolFactory, config: &dyn FlowConfig) -> SymbolId {
    factory.fresh(config.flow_value_type())
}

fn contains_at<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    probe: SymbolId,
    pre: bool,
) -> Bool<'ctx> {
    let mut disjuncts = Vec::new();
    for node in &graph.nodes {
        let keyset = if pre { node.pre_keyset } else { node.post_keyset };
        let memory = node.memory_axiom(pre);
        let in_keyset = {
            let v = encoder
                .encode_expr(Expr::variable(probe))
                .as_int()
                .expect("probe key is data-sorted");
            encoder.flow_contains_pub(keyset, v)
        };
        let contains = encoder.encode_formula(&config.logically_contains(&memory, Expr::variable(probe)));
        disjuncts.push(Bool::and(encoder.context(), &[&in_keyset, &contains]));
    }
    let refs: Vec<&Bool<'ctx>> = disjuncts.iter().collect();
    Bool::or(encoder.context(), &refs)
}

/// `EncodeIsPure`: the footprint's keyset-contents relation for `key` is
/// unchanged between pre and post (spec §4.F item 7), checked for every
/// key via a genuine forall over `probe` (see [`fresh_probe`]).
pub fn encode_is_pure<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    probe: SymbolId,
) -> Bool<'ctx> {
    encoder.encode_for_all_symbol(probe, |enc| {
        let pre_side = contains_at(enc, config, graph, probe, true);
        let post_side = contains_at(enc, config, graph, probe, false);
        pre_side._eq(&post_side)
    })
}

/// `EncodeContainsKey(key)` / `EncodeNotContainsKey(key)`: whether the
/// footprint's post-state logically contains (resp. does not contain) the
/// concrete symbol `key`, at the one point it matters (no quantifier
/// needed: `key` is already a specific symbol, e.g. an obligation's key).
pub fn encode_contains_key<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    key: SymbolId,
    post: bool,
) -> Bool<'ctx> {
    let mut disjuncts = Vec::new();
    for node in &graph.nodes {
        let keyset = if post { node.post_keyset } else { node.pre_keyset };
        let memory = node.memory_axiom(post);
        let v = encoder
            .encode_expr(Expr::variable(key))
            .as_int()
            .expect("obligation keys are data-sorted");
        let in_keyset = encoder.flow_contains_pub(keyset, v);
        let contains = encoder.encode_formula(&config.logically_contains(&memory, Expr::variable(key)));
        disjuncts.push(Bool::and(encoder.context(), &[&in_keyset, &contains]));
    }
    let refs: Vec<&Bool<'ctx>> = disjuncts.iter().collect();
    Bool::or(encoder.context(), &refs)
}

pub fn encode_not_contains_key<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    key: SymbolId,
    post: bool,
) -> Bool<'ctx> {
    encode_contains_key(encoder, config, graph, key, post).not()
}

/// `EncodeIsInsertion(key)`: the footprint's post-state contains `key`
/// while its pre-state did not, and nothing else about the footprint's
/// logical contents changed for any other key (approximated here, as in
/// the original, by comparing just this footprint in isolation — any
/// wider non-interference is the caller's responsibility via minimisation).
pub fn encode_is_insertion<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    key: SymbolId,
) -> Bool<'ctx> {
    let not_before = encode_not_contains_key(encoder, config, graph, key, false);
    let after = encode_contains_key(encoder, config, graph, key, true);
    Bool::and(encoder.context(), &[&not_before, &after])
}

/// `EncodeIsDeletion(key)`: the dual of `EncodeIsInsertion`.
pub fn encode_is_deletion<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    key: SymbolId,
) -> Bool<'ctx> {
    let before = encode_contains_key(encoder, config, graph, key, false);
    let not_after = encode_not_contains_key(encoder, config, graph, key, true);
    Bool::and(encoder.context(), &[&before, &not_after])
}
