//! Effect-context generator catalogue (spec §4.F, SPEC_FULL.md "Effect-context
//! generator catalogue"): a fixed list of single-symbol assertion templates
//! tried against a footprint node's post-state and kept in an effect's
//! `context` when implied. Grounded on `candidates.hpp`/`expand.hpp` in
//! `examples/original_source`, which enumerate the same fixed battery rather
//! than deriving it structurally.

use keyset_base::SymbolId;
use keyset_logic::{Axiom, Expr, Formula, StackOp};
use keyset_smt::{Encoder, ImplicationBatch};
use z3::ast::Bool;
use z3::Solver;

use crate::error::SolverResult;

/// The twelve candidate assertions SPEC_FULL.md names, specialised to a
/// single first-order symbol: `=true, =false, =min, >min, <max, =null,
/// ≠null, =someTid, =selfTid, =unlocked`.
pub fn candidates_for_symbol(value: SymbolId) -> Vec<Formula> {
    let v = Expr::variable(value);
    vec![
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::BoolLiteral(true))),
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::BoolLiteral(false))),
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::Min)),
        Formula::atom(Axiom::stack(StackOp::Gt, v, Expr::Min)),
        Formula::atom(Axiom::stack(StackOp::Lt, v, Expr::Max)),
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::Null)),
        Formula::atom(Axiom::stack(StackOp::Neq, v, Expr::Null)),
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::SomeTid)),
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::SelfTid)),
        Formula::atom(Axiom::stack(StackOp::Eq, v, Expr::Unlocked)),
    ]
}

/// The remaining two candidates, over a node's flow symbol rather than a
/// field value: `inflow empty`, `inflow non-empty`.
pub fn candidates_for_flow(flow: SymbolId) -> Vec<Formula> {
    vec![
        Formula::atom(Axiom::InflowEmptiness { flow, is_empty: true }),
        Formula::atom(Axiom::InflowEmptiness { flow, is_empty: false }),
    ]
}

/// Batch-checks every candidate against `premise` in one solver round-trip
/// and returns the conjunction of the ones that held, for direct use as a
/// `HeapEffect::context`.
pub fn implied_context<'ctx, 'a>(
    encoder: &mut Encoder<'ctx, 'a>,
    solver: &Solver<'ctx>,
    premise: &Bool<'ctx>,
    candidates: Vec<Formula>,
) -> SolverResult<Formula> {
    if candidates.is_empty() {
        return Ok(Formula::empty());
    }
    let encoded: Vec<Bool<'ctx>> = candidates.iter().map(|f| encoder.encode_formula(f)).collect();
    let mut batch = ImplicationBatch::new(solver);
    for e in &encoded {
        batch.add_check(e.clone());
    }
    let outcomes = batch.check(premise)?;
    let kept: Vec<Formula> = candidates
        .into_iter()
        .zip(outcomes)
        .filter_map(|(f, implied)| (implied == keyset_smt::Implied::Holds).then_some(f))
        .collect();
    Ok(Formula::and(kept))
}
