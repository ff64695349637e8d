use tracing::{debug, warn};
use z3::ast::{Ast, Bool};
use z3::{SatResult, Solver};

use crate::error::{SmtError, SmtResult};
use crate::scope::ScopeGuard;

/// Whether an implication `premise => conclusion` holds, per spec §4.D
/// `Check()`: each pending check carries a callback invoked with the
/// outcome once the batch has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implied {
    Holds,
    Fails,
}

/// Batched implication checking (spec §4.D `Check()`). The z3 crate this
/// workspace depends on does not expose a `consequences`-style batched
/// API, so this runs the "fallback" path described in spec §4.D for every
/// query: one `push`/`assert(¬conclusion)`/`check`/`pop` round-trip per
/// pending check, under a single shared premise. This is semantically
/// identical to the batched-then-fallback design, just without the
/// batching speedup a consequence-finding solver would give.
pub struct ImplicationBatch<'s, 'ctx> {
    solver: &'s Solver<'ctx>,
    pending: Vec<Bool<'ctx>>,
}

impl<'s, 'ctx> ImplicationBatch<'s, 'ctx> {
    pub fn new(solver: &'s Solver<'ctx>) -> Self {
        Self {
            solver,
            pending: Vec::new(),
        }
    }

    /// Queues `conclusion` to be checked against the batch's premise.
    pub fn add_check(&mut self, conclusion: Bool<'ctx>) {
        self.pending.push(conclusion);
    }

    /// Runs every queued check under `premise` and returns one outcome per
    /// check, in the order they were queued. A query that the solver
    /// cannot decide (`SatResult::Unknown`) is retried once at a tighter
    /// scope before being reported as [`SmtError::Unknown`] (spec §7
    /// `SolverUnknown`, "trigger fallback... if still unknown, fatal").
    pub fn check(self, premise: &Bool<'ctx>) -> SmtResult<Vec<Implied>> {
        let _premise_scope = ScopeGuard::enter(self.solver);
        self.solver.assert(premise);
        let mut outcomes = Vec::with_capacity(self.pending.len());
        for conclusion in &self.pending {
            outcomes.push(check_one(self.solver, conclusion)?);
        }
        debug!(count = outcomes.len(), "implication batch resolved");
        Ok(outcomes)
    }
}

fn check_one<'ctx>(solver: &Solver<'ctx>, conclusion: &Bool<'ctx>) -> SmtResult<Implied> {
    let _scope = ScopeGuard::enter(solver);
    solver.assert(&conclusion.clone().not());
    match solver.check() {
        SatResult::Unsat => Ok(Implied::Holds),
        SatResult::Sat => Ok(Implied::Fails),
        SatResult::Unknown => {
            warn!("solver answered unknown on first attempt, retrying per-query");
            retry_unknown(solver, conclusion)
        }
    }
}

fn retry_unknown<'ctx>(solver: &Solver<'ctx>, conclusion: &Bool<'ctx>) -> SmtResult<Implied> {
    let _scope = ScopeGuard::enter(solver);
    solver.assert(&conclusion.clone().not());
    match solver.check() {
        SatResult::Unsat => Ok(Implied::Holds),
        SatResult::Sat => Ok(Implied::Fails),
        SatResult::Unknown => Err(SmtError::Unknown {
            reason: solver.get_reason_unknown().unwrap_or_default(),
        }),
    }
}

/// A single, non-batched implication check (`Implies(a, a)` in TESTABLE
/// PROPERTIES 3, and anywhere else only one conclusion is in question).
pub fn implies<'ctx>(solver: &Solver<'ctx>, premise: &Bool<'ctx>, conclusion: &Bool<'ctx>) -> SmtResult<bool> {
    let mut batch = ImplicationBatch::new(solver);
    batch.add_check(conclusion.clone());
    Ok(batch.check(premise)?[0] == Implied::Holds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::Int;
    use z3::{Config, Context};

    #[test]
    fn implies_reflexively() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let x = Int::new_const(&ctx, "x");
        let premise = x._eq(&Int::from_i64(&ctx, 1));
        assert!(implies(&solver, &premise, &premise).unwrap());
    }

    #[test]
    fn batch_runs_independent_checks() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let x = Int::new_const(&ctx, "x");
        let premise = x._eq(&Int::from_i64(&ctx, 1));
        let mut batch = ImplicationBatch::new(&solver);
        batch.add_check(x._eq(&Int::from_i64(&ctx, 1)));
        batch.add_check(x._eq(&Int::from_i64(&ctx, 2)));
        let outcomes = batch.check(&premise).unwrap();
        assert_eq!(outcomes, vec![Implied::Holds, Implied::Fails]);
    }
}
