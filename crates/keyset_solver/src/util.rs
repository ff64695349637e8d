//! Small `Formula`-rewriting helpers shared by the command `Post` rules
//! (spec §4.F/§4.G) and by the interference/join/past/future machinery
//! (spec §4.H-§4.J): finding a memory axiom by address, replacing a
//! program variable's resource, patching a subset of a memory resource's
//! fields in place, and small symbol-reachability/value queries the
//! latter group shares.

use std::collections::HashSet;

use keyset_base::SymbolId;
use keyset_logic::{Axiom, Expr, Formula, HeapEffect};

pub(crate) fn memory_axiom_of(now: &Formula, address: SymbolId) -> Option<Axiom> {
    now.axioms().into_iter().find(|a| a.address() == Some(address)).cloned()
}

/// Replaces `program_var`'s `EqualsTo` resource with `value`, or appends a
/// fresh one if the variable had none yet (its first assignment in scope).
pub(crate) fn set_variable(now: &Formula, program_var: SymbolId, value: Expr) -> Formula {
    let mut found = false;
    let replaced = replace_equals_to(now, program_var, value, &mut found);
    if found {
        replaced
    } else {
        Formula::and(vec![replaced, Formula::atom(Axiom::EqualsTo { program_var, value })])
    }
}

fn replace_equals_to(now: &Formula, program_var: SymbolId, value: Expr, found: &mut bool) -> Formula {
    match now {
        Formula::Atom(Axiom::EqualsTo { program_var: p, .. }) if *p == program_var => {
            *found = true;
            Formula::atom(Axiom::EqualsTo { program_var, value })
        }
        Formula::Atom(a) => Formula::Atom(a.clone()),
        Formula::SeparatingConjunction(cs) => {
            Formula::SeparatingConjunction(cs.iter().map(|c| replace_equals_to(c, program_var, value, found)).collect())
        }
        Formula::StackDisjunction(cs) => {
            Formula::StackDisjunction(cs.iter().map(|c| replace_equals_to(c, program_var, value, found)).collect())
        }
        Formula::Implication(p, c) => Formula::Implication(
            Box::new(replace_equals_to(p, program_var, value, found)),
            Box::new(replace_equals_to(c, program_var, value, found)),
        ),
    }
}

/// Patches the named fields of the memory resource at `address`, leaving
/// every other field, the flow symbol and the locality untouched.
pub(crate) fn set_memory_fields(now: &Formula, address: SymbolId, updates: &[(String, Expr)]) -> Formula {
    match now {
        Formula::Atom(Axiom::Memory {
            address: a,
            flow,
            fields,
            locality,
        }) if *a == address => {
            let mut new_fields = fields.clone();
            for (name, value) in updates {
                new_fields.insert(name.clone(), *value);
            }
            Formula::atom(Axiom::memory(*a, *flow, new_fields, *locality))
        }
        Formula::Atom(a) => Formula::Atom(a.clone()),
        Formula::SeparatingConjunction(cs) => {
            Formula::SeparatingConjunction(cs.iter().map(|c| set_memory_fields(c, address, updates)).collect())
        }
        Formula::StackDisjunction(cs) => {
            Formula::StackDisjunction(cs.iter().map(|c| set_memory_fields(c, address, updates)).collect())
        }
        Formula::Implication(p, c) => Formula::Implication(
            Box::new(set_memory_fields(p, address, updates)),
            Box::new(set_memory_fields(c, address, updates)),
        ),
    }
}

/// Replaces the memory resource at `address` wholesale (as opposed to
/// patching a subset of its fields, which `set_memory_fields` already
/// covers), used when a whole snapshot is swapped for a fresh one rather
/// than incrementally updated.
pub(crate) fn replace_memory_axiom(now: &Formula, address: SymbolId, new_axiom: &Axiom) -> Formula {
    match now {
        Formula::Atom(Axiom::Memory { address: a, .. }) if *a == address => Formula::atom(new_axiom.clone()),
        Formula::Atom(a) => Formula::Atom(a.clone()),
        Formula::SeparatingConjunction(cs) => {
            Formula::SeparatingConjunction(cs.iter().map(|c| replace_memory_axiom(c, address, new_axiom)).collect())
        }
        Formula::StackDisjunction(cs) => {
            Formula::StackDisjunction(cs.iter().map(|c| replace_memory_axiom(c, address, new_axiom)).collect())
        }
        Formula::Implication(p, c) => Formula::Implication(
            Box::new(replace_memory_axiom(p, address, new_axiom)),
            Box::new(replace_memory_axiom(c, address, new_axiom)),
        ),
    }
}

/// The symbols reachable from a program-variable resource (spec §4.J,
/// "the *useful* symbols of `a`"): the value of every `EqualsTo` axiom,
/// closed under following memory axioms' flow and field values
/// transitively from there.
pub(crate) fn reachable_symbols(now: &Formula) -> HashSet<SymbolId> {
    let axioms = now.axioms();
    let mut frontier: Vec<SymbolId> = Vec::new();
    for a in &axioms {
        if let Axiom::EqualsTo { value, .. } = a {
            if let Some(s) = value.symbol() {
                frontier.push(s);
            }
        }
    }
    let mut seen: HashSet<SymbolId> = frontier.iter().copied().collect();
    while let Some(s) = frontier.pop() {
        for a in &axioms {
            if let Some((addr, flow, fields, _)) = a.as_memory() {
                if addr != s {
                    continue;
                }
                if seen.insert(flow) {
                    frontier.push(flow);
                }
                for value in fields.values() {
                    if let Some(sym) = value.symbol() {
                        if seen.insert(sym) {
                            frontier.push(sym);
                        }
                    }
                }
            }
        }
    }
    seen
}

/// The names of every field (plus the `"@flow"` sentinel) any effect in
/// `pool` may touch, i.e. the complement of the fields a past predicate
/// can safely re-alias with `now` under `ImprovePast`'s immutability step.
pub(crate) fn mutated_field_names(pool: &[HeapEffect]) -> HashSet<String> {
    let mut out = HashSet::new();
    for effect in pool {
        for field in effect.updated_fields() {
            out.insert(field.to_string());
        }
    }
    out
}

/// The value a program variable currently holds, if `now` carries a
/// resource for it.
pub(crate) fn value_of(now: &Formula, var: SymbolId) -> Option<Expr> {
    now.axioms().into_iter().find_map(|a| match a {
        Axiom::EqualsTo { program_var, value } if *program_var == var => Some(*value),
        _ => None,
    })
}
