//! Lattice join (spec §4.I): combines the annotations coming out of a
//! `Choice` branch set or a loop iteration into one annotation every
//! input implies, so the driver can keep following a single symbolic
//! state instead of a set that grows without bound. Grounded on the
//! original's `join.cpp`.

use std::collections::{BTreeMap, HashMap, HashSet};

use keyset_base::{SymbolFactory, SymbolId, SymbolType};
use keyset_logic::{collect, rename, simplify, Annotation, Axiom, Expr, FieldUpdate, Formula, FuturePredicate, Locality, PastPredicate, StackOp};
use keyset_smt::Encoder;
use tracing::{debug, info_span};
use z3::ast::Bool;
use z3::{Config, Context, SatResult, Solver};

use crate::error::{SolverError, SolverResult};
use crate::limits::Limits;
use crate::util::value_of;

fn false_formula() -> Formula {
    Formula::atom(Axiom::stack(StackOp::Neq, Expr::Null, Expr::Null))
}

fn variable_set(now: &Formula) -> HashSet<SymbolId> {
    now.axioms()
        .into_iter()
        .filter_map(|a| match a {
            Axiom::EqualsTo { program_var, .. } => Some(*program_var),
            _ => None,
        })
        .collect()
}

/// The type a variable's fresh joined value symbol should carry, inferred
/// from a sample of the value one of the inputs already assigns it.
fn value_symbol_type(value: Expr, factory: &SymbolFactory) -> SymbolType {
    match value {
        Expr::Variable(s) => factory.ty(s),
        Expr::BoolLiteral(_) => SymbolType::Bool,
        Expr::Null => SymbolType::Pointer,
        Expr::Min | Expr::Max => SymbolType::Data,
        Expr::SelfTid | Expr::SomeTid | Expr::Unlocked => SymbolType::ThreadId,
    }
}

fn filter_satisfiable(inputs: Vec<Annotation>, factory: &SymbolFactory) -> SolverResult<Vec<Annotation>> {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let mut kept = Vec::new();
    for a in inputs {
        let encoded = encoder.encode_formula(&a.now);
        solver.push();
        solver.assert(&encoded);
        let sat = solver.check();
        solver.pop(1);
        if sat != SatResult::Unsat {
            kept.push(a);
        }
    }
    Ok(kept)
}

fn common_axioms<F: Fn(&Axiom) -> bool>(inputs: &[Annotation], pred: F) -> Vec<Axiom> {
    let Some(first) = inputs.first() else { return Vec::new() };
    let candidates: Vec<Axiom> = first.now.axioms().into_iter().filter(|a| pred(a)).cloned().collect();
    candidates
        .into_iter()
        .filter(|c| inputs[1..].iter().all(|a| a.now.axioms().contains(&c)))
        .collect()
}

fn join_past(renamed_inputs: &[Annotation], factory: &mut SymbolFactory) -> Vec<PastPredicate> {
    let mut by_address: HashMap<SymbolId, Vec<Axiom>> = HashMap::new();
    for input in renamed_inputs {
        for p in &input.past {
            by_address.entry(p.address()).or_default().push(p.memory.clone());
        }
    }
    let mut out = Vec::new();
    for (address, memories) in by_address {
        if memories.len() < renamed_inputs.len() {
            continue;
        }
        let first = memories[0].clone();
        if memories.iter().all(|m| *m == first) {
            out.push(PastPredicate::new(first));
            continue;
        }
        let (_, flow, fields, locality) = first.as_memory().expect("past memory").clone();
        let mut new_flow = flow;
        if memories.iter().any(|m| m.as_memory().map(|(_, f, ..)| f) != Some(flow)) {
            new_flow = factory.fresh(SymbolType::Flow);
        }
        let mut new_fields = fields.clone();
        for (name, sample) in &fields {
            let values: Vec<Expr> = memories
                .iter()
                .filter_map(|m| m.as_memory().and_then(|(_, _, f, _)| f.get(name).copied()))
                .collect();
            if values.iter().any(|v| v != sample) {
                let ty = values.iter().find_map(|v| v.symbol()).map(|s| factory.ty(s)).unwrap_or(SymbolType::Data);
                new_fields.insert(name.clone(), Expr::variable(factory.fresh(ty)));
            }
        }
        out.push(PastPredicate::new(Axiom::memory(address, new_flow, new_fields, locality)));
    }
    out
}

fn join_future(renamed_inputs: &[Annotation]) -> Vec<FuturePredicate> {
    let Some(first) = renamed_inputs.first() else { return Vec::new() };
    first
        .future
        .iter()
        .filter(|f| renamed_inputs[1..].iter().all(|a| a.future.contains(f)))
        .cloned()
        .collect()
}

/// Joins a single chunk (spec §4.I steps 1-7) assuming `inputs.len() <=
/// Limits::max_join`; `join` handles chunking larger sets.
fn join_chunk(inputs: Vec<Annotation>, factory: &mut SymbolFactory) -> SolverResult<Annotation> {
    let sat_inputs = filter_satisfiable(inputs, factory)?;
    if sat_inputs.is_empty() {
        return Ok(Annotation::new(false_formula()));
    }
    if sat_inputs.len() == 1 {
        return Ok(sat_inputs.into_iter().next().expect("len == 1"));
    }

    let variable_sets: Vec<HashSet<SymbolId>> = sat_inputs.iter().map(|a| variable_set(&a.now)).collect();
    if variable_sets.windows(2).any(|w| w[0] != w[1]) {
        return Err(SolverError::InternalInconsistency {
            detail: "join inputs do not share an identical set of program-variable resources".into(),
        });
    }
    let variables: Vec<SymbolId> = variable_sets.into_iter().next().unwrap_or_default().into_iter().collect();

    let mut fresh_value: HashMap<SymbolId, SymbolId> = HashMap::new();
    for &var in &variables {
        let sample = value_of(&sat_inputs[0].now, var).ok_or_else(|| SolverError::InternalInconsistency {
            detail: format!("variable {var} is in scope but carries no value"),
        })?;
        let ty = value_symbol_type(sample, factory);
        fresh_value.insert(var, factory.fresh(ty));
    }

    let mut renamed_inputs: Vec<Annotation> = Vec::with_capacity(sat_inputs.len());
    for input in &sat_inputs {
        let mut map: HashMap<SymbolId, SymbolId> = HashMap::new();
        for &var in &variables {
            if let Some(value) = value_of(&input.now, var) {
                if let Some(old) = value.symbol() {
                    map.insert(old, fresh_value[&var]);
                }
            }
        }
        let renaming = |s: SymbolId| *map.get(&s).unwrap_or(&s);
        let now = rename::rename_formula(&input.now, &renaming);
        let past = input
            .past
            .iter()
            .map(|p| PastPredicate::new(rename::rename_axiom(&p.memory, &renaming)))
            .collect();
        let future = input
            .future
            .iter()
            .map(|f| FuturePredicate {
                guard: rename::rename_formula(&f.guard, &renaming),
                update: f
                    .update
                    .iter()
                    .map(|u| FieldUpdate {
                        address: renaming(u.address),
                        field: u.field.clone(),
                        value: rename::rename_expr(u.value, &renaming),
                    })
                    .collect(),
            })
            .collect();
        renamed_inputs.push(Annotation { now, past, future });
    }

    let mut common_memories: Vec<Axiom> = Vec::new();
    for &var in &variables {
        let address = fresh_value[&var];
        let memories: Vec<Option<Axiom>> = renamed_inputs.iter().map(|a| crate::util::memory_axiom_of(&a.now, address)).collect();
        if memories.iter().any(Option::is_none) {
            continue;
        }
        let memories: Vec<Axiom> = memories.into_iter().map(Option::unwrap).collect();
        let localities: Vec<Locality> = memories.iter().filter_map(|m| m.as_memory().map(|(.., l)| l)).collect();
        if localities.windows(2).any(|w| w[0] != w[1]) {
            continue;
        }
        let key_sets: Vec<Vec<&String>> = memories.iter().filter_map(|m| m.as_memory().map(|(_, _, f, _)| f.keys().collect())).collect();
        if key_sets.windows(2).any(|w| w[0] != w[1]) {
            // Different inputs shaped the cell differently; left unmodeled
            // rather than guessed at.
            continue;
        }
        let locality = localities[0];
        let flow = factory.fresh(SymbolType::Flow);
        let mut fields: BTreeMap<String, Expr> = BTreeMap::new();
        for name in key_sets[0].iter() {
            let ty = memories
                .iter()
                .filter_map(|m| m.as_memory().and_then(|(_, _, f, _)| f.get(name.as_str())))
                .find_map(|v| v.symbol())
                .map(|s| factory.ty(s))
                .unwrap_or(SymbolType::Data);
            fields.insert((*name).clone(), Expr::variable(factory.fresh(ty)));
        }
        common_memories.push(Axiom::memory(address, flow, fields, locality));
    }

    let common_obligations = common_axioms(&renamed_inputs, |a| matches!(a, Axiom::Obligation { .. }));
    let common_fulfillments = common_axioms(&renamed_inputs, |a| matches!(a, Axiom::Fulfillment { .. }));

    let mut now_children: Vec<Formula> = variables
        .iter()
        .map(|var| Formula::atom(Axiom::EqualsTo { program_var: *var, value: Expr::variable(fresh_value[var]) }))
        .collect();
    now_children.extend(common_memories.into_iter().map(Formula::atom));
    now_children.extend(common_obligations.into_iter().map(Formula::atom));
    now_children.extend(common_fulfillments.into_iter().map(Formula::atom));

    let symbols: Vec<SymbolId> = {
        let base = Formula::and(now_children.clone());
        collect::symbols_in_formula(&base).into_iter().collect()
    };
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let encoded_inputs: Vec<Bool> = renamed_inputs.iter().map(|a| encoder.encode_formula(&a.now)).collect();
    let refs: Vec<&Bool> = encoded_inputs.iter().collect();
    let disjunction = Bool::or(encoder.context(), &refs);
    let extra_candidates = simplify::stack_candidates(&symbols, |axiom| {
        let encoded = encoder.encode_formula(&Formula::atom(axiom.clone()));
        keyset_smt::implies(&solver, &disjunction, &encoded).unwrap_or(false)
    });
    now_children.extend(extra_candidates.into_iter().map(Formula::atom));

    let now = simplify::inline_and_simplify(&Formula::and(now_children));
    let past = join_past(&renamed_inputs, factory);
    let future = join_future(&renamed_inputs);
    debug!(variables = variables.len(), past = past.len(), future = future.len(), "joined");
    Ok(Annotation { now, past, future })
}

/// `Join` (spec §4.I): reduces `annotations` to one, in chunks no larger
/// than `Limits::max_join` so a wide `Choice` or large loop-invariant
/// candidate set doesn't force one unbounded SMT query.
pub fn join(factory: &mut SymbolFactory, limits: &Limits, annotations: Vec<Annotation>) -> SolverResult<Annotation> {
    let _span = info_span!("join", inputs = annotations.len()).entered();
    if annotations.is_empty() {
        return Ok(Annotation::new(false_formula()));
    }
    if annotations.len() == 1 {
        return Ok(annotations.into_iter().next().expect("len == 1"));
    }

    let chunk_size = limits.max_join.max(2);
    let mut current = annotations;
    while current.len() > 1 {
        let mut next = Vec::new();
        for chunk in current.chunks(chunk_size) {
            next.push(join_chunk(chunk.to_vec(), factory)?);
        }
        debug!(remaining = next.len(), "join chunk-reduction pass");
        current = next;
    }
    Ok(current.into_iter().next().expect("loop only exits with exactly one element"))
}
