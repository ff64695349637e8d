//! Interference pool maintenance (spec §4.H): folding a thread's published
//! heap effects into the shared pool other threads read from, pruned by
//! subsumption, and re-stabilising an annotation against that pool so a
//! proof never silently assumes a memory resource is immune to a sibling
//! thread's write. Grounded on the original's `interference.cpp` and
//! `stability.cpp`.

use std::collections::{HashMap, HashSet};

use keyset_base::{SymbolFactory, SymbolId, SymbolType};
use keyset_logic::{collect, rename, simplify, Annotation, Axiom, Expr, Formula, HeapEffect, PastPredicate};
use keyset_smt::{implies, Encoder};
use tracing::{debug, info_span};
use z3::ast::{Ast, Bool};
use z3::{Config, Context, SatResult, Solver};

use crate::error::SolverResult;
use crate::util::replace_memory_axiom;

fn effect_symbols(effect: &HeapEffect) -> HashSet<SymbolId> {
    let mut out = HashSet::new();
    collect::symbols_in_axiom(&effect.pre, &mut out);
    collect::symbols_in_axiom(&effect.post, &mut out);
    out.extend(collect::symbols_in_formula(&effect.context));
    out
}

fn as_axiom(f: Formula) -> Axiom {
    match f {
        Formula::Atom(a) => a,
        _ => unreachable!("rename_formula never changes an Atom into a compound formula"),
    }
}

/// Renames every symbol `effect` mentions to a fresh one, avoiding
/// `blacklist` (spec §4.H step 2, `RenameEffects`).
fn rename_effect(effect: &HeapEffect, factory: &mut SymbolFactory, blacklist: &HashSet<SymbolId>) -> HeapEffect {
    let combined = Formula::and(vec![
        Formula::atom(effect.pre.clone()),
        Formula::atom(effect.post.clone()),
        effect.context.clone(),
    ]);
    let types: HashMap<SymbolId, SymbolType> = collect::symbols_in_formula(&combined)
        .into_iter()
        .map(|s| (s, factory.ty(s)))
        .collect();
    let (renamed, _) = rename::default_rename(&combined, factory, blacklist, move |s| types[&s]);
    let Formula::SeparatingConjunction(mut parts) = renamed else {
        unreachable!("default_rename preserves the three-way conjunction shape built above")
    };
    let context = parts.pop().expect("three parts were pushed");
    let post = as_axiom(parts.pop().expect("three parts were pushed"));
    let pre = as_axiom(parts.pop().expect("three parts were pushed"));
    HeapEffect::new(pre, post, context)
}

/// Whether `updates_of(other)` is a subset of `updates_of(effect)`, i.e.
/// `effect` touches at least everything `other` does.
fn update_subset(effect: &HeapEffect, other: &HeapEffect) -> bool {
    let wider: HashSet<&str> = effect.updated_fields().into_iter().collect();
    other.updated_fields().into_iter().all(|f| wider.contains(f))
}

/// Pairwise effect subsumption (spec §4.H step 3): `premise` ≼ `conclusion`
/// iff `conclusion`'s updated fields are a subset of `premise`'s, neither
/// context mentions a resource, and both the pre- and post-sided
/// implications hold once the two effects' memories are forced equal.
fn subsumes<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    premise: &HeapEffect,
    conclusion: &HeapEffect,
) -> SolverResult<bool> {
    if !update_subset(premise, conclusion) {
        return Ok(false);
    }
    if premise.context.mentions_resources() || conclusion.context.mentions_resources() {
        return Ok(false);
    }

    let mem_eq_pre = encoder.encode_memory_equality(&premise.pre, &conclusion.pre);
    let mem_eq_post = encoder.encode_memory_equality(&premise.post, &conclusion.post);

    let premise_pre = encoder.encode_formula(&Formula::atom(premise.pre.clone()));
    let premise_ctx = encoder.encode_formula(&premise.context);
    let premise_post = encoder.encode_formula(&Formula::atom(premise.post.clone()));
    let conclusion_pre = encoder.encode_formula(&Formula::atom(conclusion.pre.clone()));
    let conclusion_ctx = encoder.encode_formula(&conclusion.context);
    let conclusion_post = encoder.encode_formula(&Formula::atom(conclusion.post.clone()));

    let lhs_pre = Bool::and(encoder.context(), &[&conclusion_pre, &conclusion_ctx, &mem_eq_pre, &mem_eq_post]);
    let rhs_pre = Bool::and(encoder.context(), &[&premise_pre, &premise_ctx]);
    if !implies(solver, &lhs_pre, &rhs_pre)? {
        return Ok(false);
    }

    let lhs_post = Bool::and(encoder.context(), &[&conclusion_post, &conclusion_ctx, &mem_eq_pre, &mem_eq_post]);
    let rhs_post = Bool::and(encoder.context(), &[&premise_post, &premise_ctx]);
    implies(solver, &lhs_post, &rhs_post).map_err(Into::into)
}

#[derive(Clone, Copy)]
enum Slot {
    Existing(usize),
    New(usize),
}

fn resolve<'p>(slot: Slot, pool: &'p [HeapEffect], candidates: &'p [HeapEffect]) -> &'p HeapEffect {
    match slot {
        Slot::Existing(i) => &pool[i],
        Slot::New(i) => &candidates[i],
    }
}

/// `AddInterference(newEffects)` (spec §4.H): folds `new_effects` into
/// `pool`, pruning whichever of the two sides a subsumption relation
/// makes redundant. Returns whether the pool actually grew, which the
/// proof driver's outer fixpoint (spec §4.L) uses as its stopping
/// condition.
pub fn add_interference(factory: &mut SymbolFactory, pool: &mut Vec<HeapEffect>, new_effects: Vec<HeapEffect>) -> SolverResult<bool> {
    let _span = info_span!("add_interference", pool = pool.len(), incoming = new_effects.len()).entered();

    let non_trivial: Vec<HeapEffect> = new_effects.into_iter().filter(|e| !e.is_empty_update()).collect();
    if non_trivial.is_empty() {
        debug!("no non-trivial new effects; pool unchanged");
        return Ok(false);
    }

    let mut blacklist: HashSet<SymbolId> = HashSet::new();
    for e in pool.iter().chain(non_trivial.iter()) {
        blacklist.extend(effect_symbols(e));
    }
    let candidates: Vec<HeapEffect> = non_trivial.into_iter().map(|e| rename_effect(&e, factory, &blacklist)).collect();

    let mut pairs: Vec<(Slot, Slot)> = Vec::new();
    for i in 0..pool.len() {
        for j in 0..candidates.len() {
            pairs.push((Slot::Existing(i), Slot::New(j)));
            pairs.push((Slot::New(j), Slot::Existing(i)));
        }
    }
    for i in 0..candidates.len() {
        for j in 0..candidates.len() {
            if i != j {
                pairs.push((Slot::New(i), Slot::New(j)));
            }
        }
    }

    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);

    let mut pruned_existing = vec![false; pool.len()];
    let mut pruned_new = vec![false; candidates.len()];
    let mut implications: Vec<(Slot, Slot)> = Vec::new();
    for (premise, conclusion) in pairs {
        let lhs = resolve(premise, pool, &candidates);
        let rhs = resolve(conclusion, pool, &candidates);
        if subsumes(&mut encoder, &solver, lhs, rhs)? {
            implications.push((premise, conclusion));
        }
    }

    for (premise, conclusion) in implications {
        let premise_already_pruned = match premise {
            Slot::Existing(i) => pruned_existing[i],
            Slot::New(i) => pruned_new[i],
        };
        if premise_already_pruned {
            continue;
        }
        match conclusion {
            Slot::Existing(i) => pruned_existing[i] = true,
            Slot::New(i) => pruned_new[i] = true,
        }
    }

    let mut grew = false;
    let mut survivors: Vec<HeapEffect> = Vec::new();
    for (i, e) in pool.drain(..).enumerate() {
        if !pruned_existing[i] {
            survivors.push(e);
        }
    }
    for (i, e) in candidates.into_iter().enumerate() {
        if !pruned_new[i] {
            survivors.push(e);
            grew = true;
        }
    }
    *pool = survivors;
    debug!(pool_size = pool.len(), grew, "interference pool updated");
    Ok(grew)
}

/// `MakeInterferenceStable(annotation)` (spec §4.H): for every shared
/// memory `m` the annotation still holds, checks whether any pool effect
/// could actually fire against it; if so, forgets the components that
/// effect touches (fresh-symbolising them) and records `m`'s pre-image as
/// a past predicate, so a later proof step can still recover what was
/// known about it. A no-op when the pool has nothing that applies, which
/// makes repeated calls idempotent as required.
pub fn make_interference_stable(factory: &mut SymbolFactory, annotation: &Annotation, pool: &[HeapEffect]) -> SolverResult<Annotation> {
    let _span = info_span!("make_interference_stable", pool = pool.len()).entered();
    if pool.is_empty() {
        return Ok(annotation.clone());
    }

    let shared_memories: Vec<Axiom> = annotation.now.axioms().into_iter().filter(|a| a.is_shared_memory()).cloned().collect();
    if shared_memories.is_empty() {
        return Ok(annotation.clone());
    }

    let applicable: Vec<(Axiom, HeapEffect)> = {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let mut encoder = Encoder::new(&ctx, factory);
        let now = encoder.encode_formula(&annotation.now);
        let mut out = Vec::new();
        for m in &shared_memories {
            for e in pool {
                let mem_eq = encoder.encode_memory_equality(m, &e.pre);
                let context = encoder.encode_formula(&e.context);
                let candidate = Bool::and(encoder.context(), &[&now, &mem_eq, &context]);
                solver.push();
                solver.assert(&candidate);
                let sat = solver.check();
                solver.pop(1);
                if sat != SatResult::Unsat {
                    out.push((m.clone(), e.clone()));
                }
            }
        }
        out
    };

    if applicable.is_empty() {
        debug!("no applicable effect; annotation already stable");
        return Ok(annotation.clone());
    }

    let mut affected: HashMap<SymbolId, (Axiom, HashSet<String>)> = HashMap::new();
    for (m, e) in applicable {
        let address = m.address().expect("shared_memories only contains Memory axioms");
        let entry = affected.entry(address).or_insert_with(|| (m.clone(), HashSet::new()));
        for field in e.updated_fields() {
            entry.1.insert(field.to_string());
        }
    }

    let mut now = annotation.now.clone();
    let mut past = annotation.past.clone();
    for (address, (memory, updated)) in affected {
        let (addr, flow, fields, locality) = memory.as_memory().expect("memory axiom");
        let mut new_flow = flow;
        if updated.contains("@flow") {
            new_flow = factory.fresh(SymbolType::Flow);
        }
        let mut new_fields = fields.clone();
        for name in updated.iter().filter(|n| n.as_str() != "@flow") {
            if let Some(old) = fields.get(name) {
                // The field's pointer-vs-data shape isn't tracked outside a
                // `FlowConfig`, which isn't available here; defaulting the
                // fresh symbol's type to the old value's type (when it has
                // one) keeps this sound for the common case of re-reading a
                // symbolic value, at the cost of losing precision for a
                // field whose old value was a bare sentinel like `Null`.
                let ty = old.symbol().map(|s| factory.ty(s)).unwrap_or(SymbolType::Data);
                new_fields.insert(name.clone(), Expr::variable(factory.fresh(ty)));
            }
        }
        let freshened = Axiom::memory(addr, new_flow, new_fields, locality);
        past.push(PastPredicate::new(memory));
        now = replace_memory_axiom(&now, address, &freshened);
    }

    let now = simplify::inline_and_simplify(&now);
    debug!(stabilised = past.len(), "interference stability pass complete");
    Ok(Annotation::new(now).with_past(past).with_future(annotation.future.clone()))
}
