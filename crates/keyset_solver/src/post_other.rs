//! `Post` for the non-heap-write commands (spec §4.G): variable
//! assignment, allocation, `assume`, and lock acquire/release.

use std::collections::BTreeMap;

use keyset_base::{SymbolFactory, SymbolId, SymbolType};
use keyset_logic::{simplify, Annotation, Axiom, Expr, Formula, HeapEffect, Locality, StackOp};
use keyset_flow::FlowConfig;
use keyset_program::{evaluate, ProgramExpr};
use keyset_smt::{implies, Encoder};
use tracing::debug;
use z3::ast::{Ast, Bool};
use z3::{Config, Context, SatResult, Solver};

use crate::error::{SolverError, SolverResult};
use crate::util::{memory_axiom_of, set_memory_fields, set_variable};
use crate::PostImage;

/// `Post(pre, Assign{lhs, rhs})`: the variable resource for `lhs` is
/// replaced by `rhs`'s evaluated value. A variable the configuration
/// declares a shared-variable invariant for cannot be assigned directly by
/// a single thread's view (spec §4.G "assignment to a variable with a
/// declared shared invariant goes through interference, not `Post`").
pub fn post_assign(config: &dyn FlowConfig, pre: &Annotation, lhs: SymbolId, rhs: &ProgramExpr) -> SolverResult<Annotation> {
    let value = evaluate(rhs, pre)?;
    if !config.shared_variable_invariant(lhs, value).is_empty() {
        return Err(SolverError::UnsafeUpdate {
            detail: format!("variable {lhs} carries a shared invariant and cannot be assigned outside interference"),
        });
    }
    let now = simplify::inline_and_simplify(&set_variable(&pre.now, lhs, value));
    Ok(Annotation::new(now).with_past(pre.past.clone()).with_future(pre.future.clone()))
}

/// `Post(pre, Malloc{lhs})`: allocates a fresh, local memory resource with
/// every pointer field null, every other field a fresh unconstrained
/// symbol, and an empty inflow (spec §4.G), binds `lhs` to its address, and
/// checks the local node invariant holds vacuously for the fresh cell.
pub fn post_malloc(factory: &mut SymbolFactory, config: &dyn FlowConfig, pre: &Annotation, lhs: SymbolId) -> SolverResult<Annotation> {
    let address = factory.fresh(SymbolType::Pointer);
    let flow = factory.fresh(SymbolType::Flow);
    let mut fields = BTreeMap::new();
    for field in config.pointer_fields() {
        fields.insert(field.clone(), Expr::Null);
    }
    for field in config.data_fields() {
        let value = factory.fresh(config.field_type(field));
        fields.insert(field.clone(), Expr::variable(value));
    }
    let memory = Axiom::memory(address, flow, fields, Locality::Local);

    let invariants = config.local_node_invariant(&memory);
    if !invariants.is_empty() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let mut encoder = Encoder::new(&ctx, factory);
        let empty_inflow = encoder.encode_for_all(|enc, v| enc.flow_contains_pub(flow, v).not());
        let encoded: Vec<Bool> = invariants.iter().map(|f| encoder.encode_formula(f)).collect();
        let refs: Vec<&Bool> = encoded.iter().collect();
        let conjunction = Bool::and(encoder.context(), &refs);
        if !implies(&solver, &empty_inflow, &conjunction)? {
            return Err(SolverError::InvariantViolation {
                address,
                detail: "a freshly allocated cell fails its local node invariant before any field is set".into(),
            });
        }
    }

    let mut children = match simplify::simplify(&pre.now) {
        Formula::SeparatingConjunction(cs) => cs,
        other => vec![other],
    };
    children.push(Formula::atom(memory));
    children.push(Formula::atom(Axiom::InflowEmptiness { flow, is_empty: true }));
    let now = simplify::inline_and_simplify(&set_variable(&Formula::and(children), lhs, Expr::variable(address)));
    Ok(Annotation::new(now).with_past(pre.past.clone()).with_future(pre.future.clone()))
}

/// `Post(pre, Assume(expr))` (spec §4.G): translates `expr` into a
/// `Formula`, splits at most one top-level disjunction into independent
/// branches, and drops every branch unsatisfiable with `pre`. A branch set
/// that has no survivor at all models a program path that is simply dead
/// (e.g. `assume(false)`); the caller sees this as an empty result rather
/// than an error, matching how `Fail`/`Break` also just stop a path rather
/// than raising one.
pub fn post_assume(factory: &SymbolFactory, pre: &Annotation, expr: &ProgramExpr) -> SolverResult<Vec<Annotation>> {
    let condition = translate_condition(expr, pre)?;
    let branches = match condition {
        Formula::StackDisjunction(cs) => cs,
        other => vec![other],
    };

    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let pre_now = encoder.encode_formula(&pre.now);

    let mut survivors = Vec::new();
    for branch in branches {
        let encoded_branch = encoder.encode_formula(&branch);
        let combined = Bool::and(encoder.context(), &[&pre_now, &encoded_branch]);
        solver.push();
        solver.assert(&combined);
        let sat = solver.check();
        solver.pop(1);
        if sat == SatResult::Unsat {
            continue;
        }
        let mut children = match simplify::simplify(&pre.now) {
            Formula::SeparatingConjunction(cs) => cs,
            other => vec![other],
        };
        children.push(branch);
        let now = simplify::inline_and_simplify(&Formula::and(children));
        survivors.push(Annotation::new(now).with_past(pre.past.clone()).with_future(pre.future.clone()));
    }
    if survivors.is_empty() {
        debug!("assume has no satisfiable branch; path is dead");
    }
    Ok(survivors)
}

fn translate_condition(expr: &ProgramExpr, state: &Annotation) -> SolverResult<Formula> {
    match expr {
        ProgramExpr::Compare(op, l, r) => {
            let lhs = evaluate(l, state)?;
            let rhs = evaluate(r, state)?;
            Ok(Formula::atom(Axiom::stack(*op, lhs, rhs)))
        }
        ProgramExpr::Not(inner) => match inner.as_ref() {
            ProgramExpr::Compare(op, l, r) => {
                let lhs = evaluate(l, state)?;
                let rhs = evaluate(r, state)?;
                Ok(Formula::atom(Axiom::stack(negate_op(*op), lhs, rhs)))
            }
            _ => Err(SolverError::UnsupportedConstruct {
                detail: "assume can only negate a simple comparison".into(),
            }),
        },
        ProgramExpr::And(children) => {
            let translated = children
                .iter()
                .map(|c| translate_condition(c, state))
                .collect::<SolverResult<Vec<_>>>()?;
            Ok(Formula::and(translated))
        }
        ProgramExpr::Or(children) => {
            let translated = children
                .iter()
                .map(|c| translate_condition(c, state))
                .collect::<SolverResult<Vec<_>>>()?;
            Ok(Formula::StackDisjunction(translated))
        }
        ProgramExpr::BoolLiteral(true) => Ok(Formula::empty()),
        ProgramExpr::BoolLiteral(false) => Ok(Formula::atom(Axiom::stack(StackOp::Neq, Expr::Null, Expr::Null))),
        other => {
            let value = evaluate(other, state)?;
            Ok(Formula::atom(Axiom::stack(StackOp::Eq, value, Expr::BoolLiteral(true))))
        }
    }
}

fn negate_op(op: StackOp) -> StackOp {
    match op {
        StackOp::Eq => StackOp::Neq,
        StackOp::Neq => StackOp::Eq,
        StackOp::Leq => StackOp::Gt,
        StackOp::Lt => StackOp::Geq,
        StackOp::Geq => StackOp::Lt,
        StackOp::Gt => StackOp::Leq,
    }
}

/// `Post(pre, LockAcquire{var, field})`: `ChangeLock<Unlocked, SelfTid>`
/// (spec §4.G, grounded directly on the original's `locks.cpp`).
pub fn post_lock_acquire(factory: &mut SymbolFactory, pre: &Annotation, var: SymbolId, field: &str) -> SolverResult<PostImage> {
    change_lock(factory, pre, var, field, Expr::Unlocked, Expr::SelfTid)
}

/// `Post(pre, LockRelease{var, field})`: `ChangeLock<SelfTid, Unlocked>`.
pub fn post_lock_release(factory: &mut SymbolFactory, pre: &Annotation, var: SymbolId, field: &str) -> SolverResult<PostImage> {
    change_lock(factory, pre, var, field, Expr::SelfTid, Expr::Unlocked)
}

fn change_lock(
    factory: &mut SymbolFactory,
    pre: &Annotation,
    var: SymbolId,
    field: &str,
    expected: Expr,
    new_sentinel: Expr,
) -> SolverResult<PostImage> {
    let address = match evaluate(&ProgramExpr::Var(var), pre)? {
        Expr::Variable(a) => a,
        _ => {
            return Err(SolverError::ResourceMissing {
                detail: format!("{var} does not hold a memory address"),
            })
        }
    };
    let memory = memory_axiom_of(&pre.now, address).ok_or_else(|| SolverError::ResourceMissing {
        detail: format!("no memory resource at {address}"),
    })?;
    let (_, flow, fields, locality) = memory.as_memory().expect("memory_axiom_of only returns Memory axioms");
    let current = *fields.get(field).ok_or_else(|| SolverError::ResourceMissing {
        detail: format!("memory at {address} has no field `{field}`"),
    })?;

    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let premise = encoder.encode_formula(&pre.now);
    let currently_matches = encoder.encode_formula(&Formula::atom(Axiom::stack(StackOp::Eq, current, expected)));
    if !implies(&solver, &premise, &currently_matches)? {
        return Err(SolverError::UnsafeUpdate {
            detail: format!("lock field `{field}` at {address} is not in the expected state for this transition"),
        });
    }

    let new_lock = factory.fresh(SymbolType::ThreadId);
    let new_value = Expr::variable(new_lock);
    let lock_assumption = Formula::and(vec![
        Formula::atom(Axiom::stack(StackOp::Eq, current, expected)),
        Formula::atom(Axiom::stack(StackOp::Eq, new_value, new_sentinel)),
    ]);

    let mut post_fields = fields.clone();
    post_fields.insert(field.to_string(), new_value);
    let post_memory = Axiom::memory(address, flow, post_fields, locality);

    let now = simplify::inline_and_simplify(&Formula::and(vec![
        set_memory_fields(&pre.now, address, &[(field.to_string(), new_value)]),
        Formula::atom(Axiom::stack(StackOp::Eq, new_value, new_sentinel)),
    ]));
    let annotation = Annotation::new(now).with_past(pre.past.clone()).with_future(pre.future.clone());

    let effects = if matches!(locality, Locality::Shared) {
        vec![HeapEffect::new(memory, post_memory, lock_assumption)]
    } else {
        Vec::new()
    };

    Ok(PostImage { annotations: vec![annotation], effects })
}
