use z3::Solver;

/// RAII guard for a solver `push`/`pop` pair (design note "Scoped
/// acquisition of the SMT context"). Every footprint-check block and every
/// implication batch opens one of these on entry so an early `?` return
/// still pops cleanly.
pub struct ScopeGuard<'s, 'ctx> {
    solver: &'s Solver<'ctx>,
}

impl<'s, 'ctx> ScopeGuard<'s, 'ctx> {
    pub fn enter(solver: &'s Solver<'ctx>) -> Self {
        solver.push();
        Self { solver }
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.solver.pop(1);
    }
}
