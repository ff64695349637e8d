//! Past predicate maintenance (spec §4.J `ReducePast`/`ImprovePast`):
//! keeping the set of remembered prior memory snapshots small and
//! accurate as a proof walks forward, so a later read of a field an
//! interference step forgot can still be recovered from history.

use std::collections::HashSet;

use keyset_base::SymbolFactory;
use keyset_logic::{collect, simplify, Annotation, Axiom, Formula, HeapEffect, PastPredicate, StackOp};
use keyset_smt::{implies, Encoder};
use tracing::{debug, info_span};
use z3::ast::Bool;
use z3::{Config, Context, Solver};

use crate::error::SolverResult;
use crate::util::{memory_axiom_of, mutated_field_names, reachable_symbols};

/// Whether `p`'s per-field values are all implied by `q`'s, under `now`
/// (spec §4.J subsumption: "`P` subsumes `Q`... the per-field equalities
/// `value(Q.field) -> value(P.field)`... are implied"). Returns the
/// derived stack equalities on success, which the caller folds back into
/// `now` as retained knowledge.
fn subsumes<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    now: &Bool<'ctx>,
    p: &PastPredicate,
    q: &PastPredicate,
) -> SolverResult<Option<Vec<Formula>>> {
    let (_, p_flow, p_fields, _) = p.memory.as_memory().expect("past memory");
    let (_, q_flow, q_fields, _) = q.memory.as_memory().expect("past memory");

    let mut equalities = Vec::new();
    let flow_eq = Formula::atom(Axiom::stack(StackOp::Eq, keyset_logic::Expr::variable(p_flow), keyset_logic::Expr::variable(q_flow)));
    let encoded = encoder.encode_formula(&flow_eq);
    if !implies(solver, now, &encoded)? {
        return Ok(None);
    }
    equalities.push(flow_eq);

    for (name, q_value) in q_fields {
        let Some(p_value) = p_fields.get(name) else {
            return Ok(None);
        };
        let eq = Formula::atom(Axiom::stack(StackOp::Eq, *p_value, *q_value));
        let encoded = encoder.encode_formula(&eq);
        if !implies(solver, now, &encoded)? {
            return Ok(None);
        }
        equalities.push(eq);
    }
    Ok(Some(equalities))
}

/// `ReducePast(a)` (spec §4.J): drops past predicates that share no
/// symbol with the useful (variable-reachable) part of `now`, then drops
/// any past a sibling subsumes, folding the derived equalities back into
/// `now`.
pub fn reduce_past(factory: &SymbolFactory, annotation: &Annotation) -> SolverResult<Annotation> {
    let _span = info_span!("reduce_past", count = annotation.past.len()).entered();
    let useful = reachable_symbols(&annotation.now);
    let relevant: Vec<PastPredicate> = annotation
        .past
        .iter()
        .filter(|p| {
            let mut syms = HashSet::new();
            collect::symbols_in_axiom(&p.memory, &mut syms);
            !syms.is_disjoint(&useful)
        })
        .cloned()
        .collect();

    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let now_encoded = encoder.encode_formula(&annotation.now);

    let mut dropped = vec![false; relevant.len()];
    let mut derived: Vec<Formula> = Vec::new();
    for i in 0..relevant.len() {
        if dropped[i] {
            continue;
        }
        for j in 0..relevant.len() {
            if i == j || dropped[j] || relevant[i].address() != relevant[j].address() {
                continue;
            }
            if let Some(equalities) = subsumes(&mut encoder, &solver, &now_encoded, &relevant[i], &relevant[j])? {
                dropped[j] = true;
                derived.extend(equalities);
            }
        }
    }

    let kept: Vec<PastPredicate> = relevant
        .into_iter()
        .enumerate()
        .filter_map(|(i, p)| (!dropped[i]).then_some(p))
        .collect();

    let mut children = vec![annotation.now.clone()];
    children.extend(derived);
    let now = simplify::inline_and_simplify(&Formula::and(children));
    debug!(kept = kept.len(), "past predicates reduced");
    Ok(Annotation {
        now,
        past: kept,
        future: annotation.future.clone(),
    })
}

fn realias_immutable(p: &PastPredicate, now: &Formula, mutated: &HashSet<String>) -> PastPredicate {
    let (addr, flow, fields, locality) = p.memory.as_memory().expect("past memory");
    let Some(current) = memory_axiom_of(now, addr) else {
        return p.clone();
    };
    let (_, _, current_fields, _) = current.as_memory().expect("memory axiom");
    let mut new_fields = fields.clone();
    for (name, value) in current_fields {
        if !mutated.contains(name) {
            new_fields.insert(name.clone(), *value);
        }
    }
    PastPredicate::new(Axiom::memory(addr, flow, new_fields, locality))
}

/// Substitutes a past field's value with `now`'s current value whenever
/// that substitution is explained by a recorded effect's post-image
/// (spec §4.J step 3, "effect interpolation"), approximating the
/// original's Hoare-style side-check: the check that an effect is sound
/// against any shared memory already ran when the effect entered the
/// pool (`interference::add_interference`/`make_interference_stable`), so
/// re-deriving a past from one only needs to confirm the effect's
/// post-image actually produced the value in question.
fn interpolate_effects(p: PastPredicate, now: &Formula, pool: &[HeapEffect]) -> PastPredicate {
    let (addr, flow, fields, locality) = p.memory.as_memory().expect("past memory");
    let Some(current) = memory_axiom_of(now, addr) else {
        return p;
    };
    let (_, _, current_fields, _) = current.as_memory().expect("memory axiom");
    let mut new_fields = fields.clone();
    for (name, value) in fields {
        let Some(current_value) = current_fields.get(name) else {
            continue;
        };
        if current_value == value {
            continue;
        }
        let explained = pool.iter().any(|e| {
            e.post
                .as_memory()
                .map(|(a, _, post_fields, _)| a == addr && post_fields.get(name) == Some(current_value))
                .unwrap_or(false)
        });
        if explained {
            new_fields.insert(name.clone(), *current_value);
        }
    }
    PastPredicate::new(Axiom::memory(addr, flow, new_fields, locality))
}

/// `ImprovePast(a)` (spec §4.J): re-aliases a past's untouched fields with
/// `now`'s current value (step 1), adds a trivial past for every shared
/// memory not already represented (step 4), and interpolates effect
/// post-images into pasts a recorded effect explains (step 3). Step 2's
/// memory-frontier expansion is folded into `ReducePast`'s subsumption
/// pass instead of kept separate, since both ultimately just grow the
/// set of derivable stack equalities.
pub fn improve_past(annotation: &Annotation, pool: &[HeapEffect]) -> SolverResult<Annotation> {
    let _span = info_span!("improve_past", pool = pool.len()).entered();
    let mutated = mutated_field_names(pool);

    let mut past: Vec<PastPredicate> = annotation.past.iter().map(|p| realias_immutable(p, &annotation.now, &mutated)).collect();

    for axiom in annotation.now.axioms() {
        if axiom.is_shared_memory() {
            let address = axiom.address().expect("is_shared_memory implies Memory");
            if !past.iter().any(|p| p.address() == address) {
                past.push(PastPredicate::new(axiom.clone()));
            }
        }
    }

    past = past.into_iter().map(|p| interpolate_effects(p, &annotation.now, pool)).collect();

    let now = simplify::inline_and_simplify(&annotation.now);
    debug!(past = past.len(), "past predicates improved");
    Ok(Annotation {
        now,
        past,
        future: annotation.future.clone(),
    })
}
