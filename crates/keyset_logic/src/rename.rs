use std::collections::HashMap;

use keyset_base::{SymbolFactory, SymbolId, SymbolType};

use crate::axiom::Axiom;
use crate::expr::Expr;
use crate::formula::Formula;

/// `RenameSymbols(obj, renaming)` (spec §4.A): replaces every occurrence of
/// a symbol `s` by `renaming(s)`.
pub fn rename_formula(formula: &Formula, renaming: &impl Fn(SymbolId) -> SymbolId) -> Formula {
    match formula {
        Formula::Atom(a) => Formula::Atom(rename_axiom(a, renaming)),
        Formula::SeparatingConjunction(cs) => {
            Formula::SeparatingConjunction(cs.iter().map(|c| rename_formula(c, renaming)).collect())
        }
        Formula::StackDisjunction(cs) => {
            Formula::StackDisjunction(cs.iter().map(|c| rename_formula(c, renaming)).collect())
        }
        Formula::Implication(p, c) => Formula::Implication(
            Box::new(rename_formula(p, renaming)),
            Box::new(rename_formula(c, renaming)),
        ),
    }
}

pub fn rename_expr(expr: Expr, renaming: &impl Fn(SymbolId) -> SymbolId) -> Expr {
    match expr {
        Expr::Variable(s) => Expr::Variable(renaming(s)),
        other => other,
    }
}

pub fn rename_axiom(axiom: &Axiom, renaming: &impl Fn(SymbolId) -> SymbolId) -> Axiom {
    match axiom {
        Axiom::Stack { op, lhs, rhs } => Axiom::Stack {
            op: *op,
            lhs: rename_expr(*lhs, renaming),
            rhs: rename_expr(*rhs, renaming),
        },
        Axiom::InflowEmptiness { flow, is_empty } => Axiom::InflowEmptiness {
            flow: renaming(*flow),
            is_empty: *is_empty,
        },
        Axiom::InflowContainsValue { flow, value } => Axiom::InflowContainsValue {
            flow: renaming(*flow),
            value: rename_expr(*value, renaming),
        },
        Axiom::InflowContainsRange { flow, lo, hi } => Axiom::InflowContainsRange {
            flow: renaming(*flow),
            lo: rename_expr(*lo, renaming),
            hi: rename_expr(*hi, renaming),
        },
        Axiom::EqualsTo { program_var, value } => Axiom::EqualsTo {
            program_var: renaming(*program_var),
            value: rename_expr(*value, renaming),
        },
        Axiom::Memory {
            address,
            flow,
            fields,
            locality,
        } => Axiom::Memory {
            address: renaming(*address),
            flow: renaming(*flow),
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), rename_expr(*v, renaming)))
                .collect(),
            locality: *locality,
        },
        Axiom::Obligation { spec, key } => Axiom::Obligation {
            spec: *spec,
            key: renaming(*key),
        },
        Axiom::Fulfillment { return_value } => Axiom::Fulfillment {
            return_value: rename_expr(*return_value, renaming),
        },
    }
}

/// Builds the *default* renaming described in spec §4.A: every first-time
/// encountered symbol in `formula` is mapped to a fresh symbol drawn from
/// `factory`, avoiding `blacklist`; repeat occurrences of the same symbol
/// map consistently to the same fresh symbol. Returns the substitution map
/// alongside the renamed formula so callers (e.g. the interference engine)
/// can apply the same renaming to sibling objects (past/future predicates,
/// other effects sharing symbols).
pub fn default_rename(
    formula: &Formula,
    factory: &mut SymbolFactory,
    blacklist: &std::collections::HashSet<SymbolId>,
    type_of: impl Fn(SymbolId) -> SymbolType,
) -> (Formula, HashMap<SymbolId, SymbolId>) {
    let mut map: HashMap<SymbolId, SymbolId> = HashMap::new();
    for s in crate::collect::symbols_in_formula(formula) {
        map.entry(s)
            .or_insert_with(|| factory.fresh_avoiding(type_of(s), blacklist));
    }
    let renamed = rename_formula(formula, &|s| *map.get(&s).unwrap_or(&s));
    (renamed, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::StackOp;

    #[test]
    fn renaming_replaces_every_occurrence() {
        let mut f = SymbolFactory::new();
        let x = f.fresh(SymbolType::Data);
        let y = f.fresh(SymbolType::Data);
        let formula = Formula::and(vec![Formula::atom(Axiom::stack(
            StackOp::Eq,
            Expr::variable(x),
            Expr::variable(x),
        ))]);
        let renaming = |s: SymbolId| if s == x { y } else { s };
        let renamed = rename_formula(&formula, &renaming);
        let syms = crate::collect::symbols_in_formula(&renamed);
        assert!(syms.contains(&y));
        assert!(!syms.contains(&x));
    }
}
