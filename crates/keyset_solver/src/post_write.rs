//! `Post` for memory writes (spec §4.F), the largest single check in the
//! proof engine: footprint construction, the seven post-image checks,
//! minimisation, and effect extraction.

use keyset_base::{SymbolFactory, SymbolId};
use keyset_logic::{simplify, Annotation, Axiom, Expr, Formula, HeapEffect, SpecKind};
use keyset_flow::{encode as flow_encode, make_flow_footprint, FlowConfig, FlowGraph, HeapWrite};
use keyset_smt::{implies, Encoder};
use tracing::{debug, info_span};
use z3::ast::{Ast, Bool};
use z3::{Config, Context, Solver};

use crate::effect_context::{candidates_for_flow, candidates_for_symbol, implied_context};
use crate::error::{SolverError, SolverResult};
use crate::limits::Limits;
use crate::util::set_memory_fields;
use crate::PostImage;

/// Runs `Post` for a heap write (spec §4.F). `write` is consumed: on the
/// future-predicate shortcut path it never reaches footprint construction at
/// all.
pub fn post_memory_write(
    factory: &mut SymbolFactory,
    config: &dyn FlowConfig,
    limits: &Limits,
    pre: &Annotation,
    write: HeapWrite,
) -> SolverResult<PostImage> {
    let _span = info_span!("post_memory_write", address = %write.address).entered();

    if let Some(annotation) = try_future_shortcut(pre, &write) {
        debug!("write satisfied by an existing future predicate; skipping footprint construction");
        return Ok(PostImage::single(annotation));
    }

    let mut graph = make_flow_footprint(pre, &write, config, factory)?;
    let probe = flow_encode::fresh_probe(factory);
    let flow_probe = flow_encode::fresh_flow_probe(factory, config);

    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);

    let premise = build_premise(&mut encoder, config, &graph, flow_probe);

    // Check 2: acyclicity (structural, not an SMT query).
    if !flow_encode::is_acyclic(&graph, false) {
        return Err(SolverError::CycleInFootprint { root: write.address });
    }

    // Check 1: publishing reachability.
    check_publishing_reachability(&mut encoder, &solver, &premise, &mut graph)?;

    // Check 3: flow coverage.
    check_flow_coverage(&mut encoder, &solver, &premise, &mut graph)?;

    // Check 4: keyset disjointness.
    let post_keysets: Vec<SymbolId> = graph.nodes.iter().map(|n| n.post_keyset).collect();
    let disjoint = encoder.encode_keyset_disjointness(&post_keysets);
    if !implies(&solver, &premise, &disjoint)? {
        return Err(SolverError::UnsafeUpdate {
            detail: "post-keysets of the footprint are not pairwise disjoint".into(),
        });
    }

    // Check 5: inflow uniqueness. Sources are this node's frame inflow plus
    // the root-outflow of every footprint edge whose structural target is
    // this node — cf. the original's `GetGraphInflow`, which walks only
    // incoming edges, not every pointer field in the footprint.
    for node in &graph.nodes {
        let mut sources = vec![node.frame_inflow];
        for other in &graph.nodes {
            for field in other.pointer_fields.values() {
                if field.post_value.symbol() == Some(node.address) {
                    sources.push(field.post_root_outflow);
                }
            }
        }
        let unique = encoder.encode_inflow_uniqueness(node.post_all_inflow, &sources, limits.max_inflow_predecessors);
        if !implies(&solver, &premise, &unique)? {
            return Err(SolverError::UnsafeUpdate {
                detail: format!("inflow of node {} is not explained by at most {} sources", node.address, limits.max_inflow_predecessors),
            });
        }
    }

    // Check 6: invariant maintenance.
    let invariants_post = flow_encode::encode_invariants(&mut encoder, config, &graph, false);
    if !implies(&solver, &premise, &invariants_post)? {
        return Err(SolverError::InvariantViolation {
            address: write.address,
            detail: "node invariant does not hold in the post-state".into(),
        });
    }

    // Check 7: specification (isPure / obligation discharge).
    let is_pure = flow_encode::encode_is_pure(&mut encoder, config, &graph, probe);
    let is_pure_holds = implies(&solver, &premise, &is_pure)?;
    let (fulfillments, consumed) = discharge_obligations(&mut encoder, &solver, &premise, config, &graph, is_pure_holds)?;

    graph.minimise();

    let mut effects = Vec::new();
    for node in &graph.nodes {
        if node.post_local {
            continue;
        }
        let mut candidates = Vec::new();
        let post_memory = node.memory_axiom(false);
        let (_, post_flow, post_fields, _) = post_memory.as_memory().unwrap();
        for value in post_fields.values() {
            if let Some(sym) = value.symbol() {
                candidates.extend(candidates_for_symbol(sym));
            }
        }
        candidates.extend(candidates_for_flow(post_flow));
        let context = implied_context(&mut encoder, &solver, &premise, candidates)?;
        let effect = HeapEffect::new(node.memory_axiom(true), node.memory_axiom(false), context);
        if !effect.is_empty_update() {
            effects.push(effect);
        }
    }

    let now = build_post_now(&pre.now, &graph, &consumed, &fulfillments);
    let now = rederive_stack_candidates(&mut encoder, &solver, &now);
    let annotation = Annotation::new(now).with_past(pre.past.clone()).with_future(pre.future.clone());

    Ok(PostImage { annotations: vec![annotation], effects })
}

fn try_future_shortcut(pre: &Annotation, write: &HeapWrite) -> Option<Annotation> {
    for (i, future) in pre.future.iter().enumerate() {
        let matches = future.update.len() == write.updates.len()
            && future.update.iter().all(|u| {
                u.address == write.address && write.updates.iter().any(|(f, v)| *f == u.field && *v == u.value)
            });
        if !matches {
            continue;
        }
        let now = set_memory_fields(&pre.now, write.address, &write.updates);
        let mut remaining_future = pre.future.clone();
        remaining_future.remove(i);
        return Some(
            Annotation::new(simplify::inline_and_simplify(&now))
                .with_past(pre.past.clone())
                .with_future(remaining_future),
        );
    }
    None
}

fn build_premise<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    flow_probe: SymbolId,
) -> Bool<'ctx> {
    let now = encoder.encode_formula(&graph.pre.now);
    let invariants = flow_encode::encode_invariants(encoder, config, graph, true);
    let flow_rules = flow_encode::encode_simple_flow_rules(encoder, config, graph, flow_probe);
    let ownership = encoder.encode_ownership(&graph.addresses());
    Bool::and(encoder.context(), &[&now, &invariants, &flow_rules, &ownership])
}

fn target_ok<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    premise: &Bool<'ctx>,
    graph: &FlowGraph,
    expr: Expr,
) -> SolverResult<bool> {
    if expr.is_sentinel() {
        return Ok(true);
    }
    if let Some(sym) = expr.symbol() {
        if graph.contains(sym) {
            return Ok(true);
        }
    }
    let is_null = encoder.encode_is_null(expr);
    Ok(implies(solver, premise, &is_null)?)
}

fn mark_needed(graph: &mut FlowGraph, expr: Expr) {
    if let Some(sym) = expr.symbol() {
        if let Some(node) = graph.node_mut(sym) {
            node.needed = true;
        }
    }
}

fn check_publishing_reachability<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    premise: &Bool<'ctx>,
    graph: &mut FlowGraph,
) -> SolverResult<()> {
    let publishing: Vec<(SymbolId, Vec<Expr>)> = graph
        .nodes
        .iter()
        .filter(|n| n.publishes())
        .map(|n| (n.address, n.pointer_successors(false)))
        .collect();
    for (address, successors) in publishing {
        for succ in successors {
            if !target_ok(encoder, solver, premise, graph, succ)? {
                return Err(SolverError::FootprintTooSmall {
                    detail: format!("publishing node {address} reaches a successor outside the footprint that cannot be proven null"),
                });
            }
            mark_needed(graph, succ);
        }
    }
    Ok(())
}

fn flows_equal<'ctx, 'a>(encoder: &mut Encoder<'ctx, 'a>, a: SymbolId, b: SymbolId) -> Bool<'ctx> {
    encoder.encode_for_all(move |enc, v| enc.flow_contains_pub(a, v.clone())._eq(&enc.flow_contains_pub(b, v)))
}

fn check_flow_coverage<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    premise: &Bool<'ctx>,
    graph: &mut FlowGraph,
) -> SolverResult<()> {
    let addresses = graph.addresses();
    for address in addresses {
        let fields: Vec<_> = graph
            .node(address)
            .unwrap()
            .pointer_fields
            .values()
            .map(|f| (f.pre_value, f.post_value, f.pre_all_outflow, f.post_all_outflow))
            .collect();
        for (pre_value, post_value, pre_outflow, post_outflow) in fields {
            let equal = flows_equal(encoder, pre_outflow, post_outflow);
            if implies(solver, premise, &equal)? {
                continue;
            }
            for target in [pre_value, post_value] {
                if !target_ok(encoder, solver, premise, graph, target)? {
                    return Err(SolverError::FootprintTooSmall {
                        detail: format!("node {address} has a changed-outflow field whose target lies outside the footprint"),
                    });
                }
                mark_needed(graph, target);
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn discharge_obligations<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    premise: &Bool<'ctx>,
    config: &dyn FlowConfig,
    graph: &FlowGraph,
    is_pure: bool,
) -> SolverResult<(Vec<Formula>, Vec<Axiom>)> {
    let obligations: Vec<Axiom> = graph
        .pre
        .now
        .axioms()
        .into_iter()
        .filter(|a| matches!(a, Axiom::Obligation { .. }))
        .cloned()
        .collect();

    let mut fulfillments = Vec::new();
    let mut consumed = Vec::new();

    for obligation in &obligations {
        let Axiom::Obligation { spec, key } = obligation else {
            unreachable!()
        };
        match spec {
            SpecKind::Contains => {
                if !is_pure {
                    return Err(SolverError::UnsafeUpdate {
                        detail: "contains obligation requires a pure (non-mutating) update".into(),
                    });
                }
                let contains = flow_encode::encode_contains_key(encoder, config, graph, *key, true);
                let holds = implies(solver, premise, &contains)?;
                fulfillments.push(Formula::atom(Axiom::Fulfillment {
                    return_value: Expr::BoolLiteral(holds),
                }));
                consumed.push(obligation.clone());
            }
            SpecKind::Insert | SpecKind::Delete => {
                if is_pure {
                    continue; // forward the obligation unchanged
                }
                let witnessed = if matches!(spec, SpecKind::Insert) {
                    flow_encode::encode_is_insertion(encoder, config, graph, *key)
                } else {
                    flow_encode::encode_is_deletion(encoder, config, graph, *key)
                };
                if !implies(solver, premise, &witnessed)? {
                    return Err(SolverError::UnsafeUpdate {
                        detail: format!("impure update does not witness the pending {spec:?} obligation"),
                    });
                }
                fulfillments.push(Formula::atom(Axiom::Fulfillment {
                    return_value: Expr::BoolLiteral(true),
                }));
                consumed.push(obligation.clone());
            }
        }
    }

    if obligations.is_empty() && !is_pure {
        return Err(SolverError::UnsafeUpdate {
            detail: "impure update with no pending obligation to discharge it".into(),
        });
    }

    Ok((fulfillments, consumed))
}

fn build_post_now(now: &Formula, graph: &FlowGraph, consumed: &[Axiom], fulfillments: &[Formula]) -> Formula {
    let rewritten = rewrite_post_memories(now, graph, consumed);
    let mut children = match simplify::simplify(&rewritten) {
        Formula::SeparatingConjunction(cs) => cs,
        other => vec![other],
    };
    children.extend(fulfillments.iter().cloned());
    simplify::inline_and_simplify(&Formula::and(children))
}

fn rewrite_post_memories(now: &Formula, graph: &FlowGraph, consumed: &[Axiom]) -> Formula {
    match now {
        Formula::Atom(Axiom::Memory { address, .. }) => match graph.node(*address) {
            Some(node) if node.needed || node.any_field_changed() => Formula::Atom(node.memory_axiom(false)),
            _ => now.clone(),
        },
        Formula::Atom(a) if consumed.contains(a) => Formula::empty(),
        Formula::Atom(a) => Formula::Atom(a.clone()),
        Formula::SeparatingConjunction(cs) => {
            Formula::SeparatingConjunction(cs.iter().map(|c| rewrite_post_memories(c, graph, consumed)).collect())
        }
        Formula::StackDisjunction(cs) => {
            Formula::StackDisjunction(cs.iter().map(|c| rewrite_post_memories(c, graph, consumed)).collect())
        }
        Formula::Implication(p, c) => Formula::Implication(
            Box::new(rewrite_post_memories(p, graph, consumed)),
            Box::new(rewrite_post_memories(c, graph, consumed)),
        ),
    }
}

fn rederive_stack_candidates<'ctx, 'a>(encoder: &mut Encoder<'ctx, 'a>, solver: &Solver<'ctx>, now: &Formula) -> Formula {
    let symbols: Vec<SymbolId> = keyset_logic::collect::symbols_in_formula(now).into_iter().collect();
    let premise = encoder.encode_formula(now);
    let extra = simplify::stack_candidates(&symbols, |candidate| {
        let encoded = encoder.encode_formula(&Formula::atom(candidate.clone()));
        implies(solver, &premise, &encoded).unwrap_or(false)
    });
    let mut children = match now {
        Formula::SeparatingConjunction(cs) => cs.clone(),
        other => vec![other.clone()],
    };
    children.extend(extra.into_iter().map(Formula::atom));
    simplify::inline_and_simplify(&Formula::and(children))
}
