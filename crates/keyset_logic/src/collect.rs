use std::collections::HashSet;

use keyset_base::SymbolId;

use crate::axiom::Axiom;
use crate::expr::Expr;
use crate::formula::Formula;

/// `Collect<T>(obj, predicate)` (spec §4.A): the set of sub-objects of type
/// `T` satisfying `predicate`, deduplicated by identity. For symbols,
/// identity is `SymbolId` equality; for axioms it is structural equality
/// (axioms carry no separate identity of their own).
pub fn collect_axioms<'a>(formula: &'a Formula, predicate: impl Fn(&Axiom) -> bool) -> Vec<&'a Axiom> {
    formula
        .axioms()
        .into_iter()
        .filter(|a| predicate(a))
        .collect()
}

/// Every symbol occurring in an axiom's expressions, addresses or flows.
pub fn symbols_in_axiom(axiom: &Axiom, out: &mut HashSet<SymbolId>) {
    let push_expr = |e: &Expr, out: &mut HashSet<SymbolId>| {
        if let Some(s) = e.symbol() {
            out.insert(s);
        }
    };
    match axiom {
        Axiom::Stack { lhs, rhs, .. } => {
            push_expr(lhs, out);
            push_expr(rhs, out);
        }
        Axiom::InflowEmptiness { flow, .. } => {
            out.insert(*flow);
        }
        Axiom::InflowContainsValue { flow, value } => {
            out.insert(*flow);
            push_expr(value, out);
        }
        Axiom::InflowContainsRange { flow, lo, hi } => {
            out.insert(*flow);
            push_expr(lo, out);
            push_expr(hi, out);
        }
        Axiom::EqualsTo { program_var, value } => {
            out.insert(*program_var);
            push_expr(value, out);
        }
        Axiom::Memory {
            address,
            flow,
            fields,
            ..
        } => {
            out.insert(*address);
            out.insert(*flow);
            for v in fields.values() {
                push_expr(v, out);
            }
        }
        Axiom::Obligation { key, .. } => {
            out.insert(*key);
        }
        Axiom::Fulfillment { return_value } => push_expr(return_value, out),
    }
}

/// Every symbol occurring anywhere in `formula`, deduplicated by identity.
pub fn symbols_in_formula(formula: &Formula) -> HashSet<SymbolId> {
    let mut out = HashSet::new();
    for axiom in formula.axioms() {
        symbols_in_axiom(axiom, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::StackOp;
    use keyset_base::{SymbolFactory, SymbolType};

    #[test]
    fn collects_distinct_symbols() {
        let mut f = SymbolFactory::new();
        let x = f.fresh(SymbolType::Data);
        let y = f.fresh(SymbolType::Data);
        let formula = Formula::and(vec![
            Formula::atom(Axiom::stack(StackOp::Eq, Expr::variable(x), Expr::variable(y))),
            Formula::atom(Axiom::stack(StackOp::Lt, Expr::variable(x), Expr::Max)),
        ]);
        let syms = symbols_in_formula(&formula);
        assert_eq!(syms.len(), 2);
        assert!(syms.contains(&x) && syms.contains(&y));
    }
}
