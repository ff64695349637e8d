//! SMT-backed satisfiability and implication checks the driver needs
//! outside any single `Post`/`Join` call: whether a `Fail` is actually
//! reachable, and whether a `Return`'s annotation discharges its function's
//! specification (spec §4.L "linearizability check").

use keyset_base::SymbolFactory;
use keyset_logic::{Annotation, Axiom, Expr, Formula, StackOp};
use keyset_smt::{implies, Encoder};
use z3::{Config, Context, SatResult, Solver};

use crate::error::ProofResult;

pub(crate) fn is_satisfiable(factory: &SymbolFactory, now: &Formula) -> ProofResult<bool> {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let encoded = encoder.encode_formula(now);
    solver.push();
    solver.assert(&encoded);
    let sat = solver.check();
    solver.pop(1);
    Ok(sat != SatResult::Unsat)
}

pub(crate) fn formula_implies(factory: &SymbolFactory, premise: &Formula, conclusion: &Formula) -> ProofResult<bool> {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);
    let mut encoder = Encoder::new(&ctx, factory);
    let p = encoder.encode_formula(premise);
    let c = encoder.encode_formula(conclusion);
    Ok(implies(&solver, &p, &c)?)
}

/// Checks every `(annotation, returned value)` pair a function's body
/// produced at a `Return` (spec §4.L): a pair is fine either because its
/// annotation is unsatisfiable (the path is dead) or because `now` carries
/// a `Fulfillment` whose recorded value the returned expression matches.
pub(crate) fn check_linearizability(factory: &SymbolFactory, function: &str, returning: &[(Annotation, Option<Expr>)]) -> ProofResult<()> {
    for (annotation, returned) in returning {
        if !is_satisfiable(factory, &annotation.now)? {
            continue;
        }

        let fulfillments: Vec<Expr> = annotation
            .now
            .axioms()
            .into_iter()
            .filter_map(|a| match a {
                Axiom::Fulfillment { return_value } => Some(*return_value),
                _ => None,
            })
            .collect();
        if fulfillments.is_empty() {
            return Err(crate::error::ProofError::Unfulfilled { function: function.to_string() });
        }

        let Some(expected) = returned else {
            continue;
        };
        let mut matched = false;
        for fulfilled in &fulfillments {
            let eq = Formula::atom(Axiom::stack(StackOp::Eq, *fulfilled, *expected));
            if formula_implies(factory, &annotation.now, &eq)? {
                matched = true;
                break;
            }
        }
        if !matched {
            return Err(crate::error::ProofError::Unfulfilled { function: function.to_string() });
        }
    }
    Ok(())
}
