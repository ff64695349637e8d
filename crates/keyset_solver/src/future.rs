//! Future predicate maintenance (spec §4.J `ReduceFuture`/`ImproveFuture`):
//! offering the driver a cheap shortcut for a heap write it is about to
//! perform, by remembering that some future state of the program is
//! already known to make that write happen
//! (`post_write::try_future_shortcut` is the consumer of what this module
//! produces).

use std::collections::HashSet;

use keyset_base::SymbolId;
use keyset_flow::HeapWrite;
use keyset_logic::{collect, Annotation, FieldUpdate, Formula, FuturePredicate, HeapEffect};
use tracing::{debug, info_span};

use crate::error::SolverResult;
use crate::util::{mutated_field_names, reachable_symbols};

fn future_symbols(f: &FuturePredicate) -> HashSet<SymbolId> {
    let mut out = collect::symbols_in_formula(&f.guard);
    for u in &f.update {
        out.insert(u.address);
        if let Some(s) = u.value.symbol() {
            out.insert(s);
        }
    }
    out
}

/// Whether `wider`'s update set covers `narrower`'s, i.e. `narrower` adds
/// nothing `wider` doesn't already promise (field-tuple-and-value
/// equality standing in for the original's symbol renaming, since this
/// crate's symbols already carry a stable identity across the
/// comparison).
fn future_subsumes(wider: &FuturePredicate, narrower: &FuturePredicate) -> bool {
    wider != narrower && wider.guard == narrower.guard && narrower.update.iter().all(|u| wider.update.contains(u))
}

/// `ReduceFuture(a)` (spec §4.J): drops a future with no symbol in common
/// with the useful (variable-reachable) part of `now`, then drops any
/// future a sibling subsumes.
pub fn reduce_future(annotation: &Annotation) -> SolverResult<Annotation> {
    let _span = info_span!("reduce_future", count = annotation.future.len()).entered();
    let useful = reachable_symbols(&annotation.now);
    let live: Vec<FuturePredicate> = annotation
        .future
        .iter()
        .filter(|f| future_symbols(f).iter().any(|s| useful.contains(s)))
        .cloned()
        .collect();

    let mut kept: Vec<FuturePredicate> = Vec::new();
    for candidate in &live {
        let subsumed_by_another = live.iter().any(|other| future_subsumes(other, candidate));
        if !subsumed_by_another && !kept.contains(candidate) {
            kept.push(candidate.clone());
        }
    }
    debug!(kept = kept.len(), "future predicates reduced");
    Ok(Annotation {
        now: annotation.now.clone(),
        past: annotation.past.clone(),
        future: kept,
    })
}

fn covers(existing: &FuturePredicate, candidate: &FuturePredicate) -> bool {
    candidate.update.iter().all(|u| existing.update.contains(u))
}

/// `ImproveFuture(a, target)` (spec §4.J): offers a trivial future
/// predicate promising `target`'s write when no existing future already
/// covers it and every field it touches is immutable against the
/// recorded interference pool — the condition under which the write is
/// guaranteed to still apply unchanged whenever that future state is
/// reached.
pub fn improve_future(annotation: &Annotation, target: &HeapWrite, pool: &[HeapEffect]) -> SolverResult<Annotation> {
    let _span = info_span!("improve_future", address = %target.address).entered();
    let trivial = FuturePredicate {
        guard: Formula::empty(),
        update: target
            .updates
            .iter()
            .map(|(field, value)| FieldUpdate {
                address: target.address,
                field: field.clone(),
                value: *value,
            })
            .collect(),
    };

    if annotation.future.iter().any(|f| covers(f, &trivial)) {
        debug!("target write already covered by an existing future predicate");
        return Ok(annotation.clone());
    }

    let mutated = mutated_field_names(pool);
    let stable = trivial.update.iter().all(|u| !mutated.contains(&u.field));
    if !stable {
        debug!("target write touches a field the interference pool may still change; no future offered");
        return Ok(annotation.clone());
    }

    let mut future = annotation.future.clone();
    future.push(trivial);
    debug!("offered a trivial future predicate for the upcoming write");
    Ok(Annotation {
        now: annotation.now.clone(),
        past: annotation.past.clone(),
        future,
    })
}
