use keyset_base::SymbolId;

use crate::axiom::{Axiom, StackOp};
use crate::expr::Expr;
use crate::formula::Formula;
use crate::rename::rename_formula;

/// `Simplify(obj)` (spec §4.B): flattens nested separating conjunctions.
/// Does not cross an implication's premise/conclusion boundary: each side
/// of an `Implication` is simplified on its own, but a conjunct can never
/// migrate from inside an implication to the formula enclosing it, nor
/// vice versa.
pub fn simplify(formula: &Formula) -> Formula {
    match formula {
        Formula::Atom(a) => Formula::Atom(a.clone()),
        Formula::SeparatingConjunction(children) => {
            let mut flat = Vec::new();
            for child in children {
                match simplify(child) {
                    Formula::SeparatingConjunction(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            Formula::SeparatingConjunction(flat)
        }
        Formula::StackDisjunction(children) => {
            Formula::StackDisjunction(children.iter().map(simplify).collect())
        }
        Formula::Implication(premise, conclusion) => Formula::Implication(
            Box::new(simplify(premise)),
            Box::new(simplify(conclusion)),
        ),
    }
}

/// `InlineAndSimplify(obj)` (spec §4.B): flatten, inline memory equalities
/// and top-level variable equalities, then drop trivial/duplicate
/// conjuncts. Only operates at the top `SeparatingConjunction` level of
/// `formula`'s own scope; it does not reach into implications or
/// past/future sub-formulas (those are simplified separately by their
/// owners).
pub fn inline_and_simplify(formula: &Formula) -> Formula {
    let flattened = simplify(formula);
    let Formula::SeparatingConjunction(children) = flattened else {
        return flattened;
    };

    // Step 2: memory equalities. Two memory axioms at the same address
    // produce symbol equalities for flow and every field; we keep the
    // first occurrence as the representative and record the symbol
    // equalities the duplicate implies, to be folded in by step 3. Every
    // non-memory child passes through untouched.
    let mut seen_addresses: Vec<(SymbolId, Axiom)> = Vec::new();
    let mut equalities: Vec<(SymbolId, SymbolId)> = Vec::new();
    let mut rebuilt: Vec<Formula> = Vec::new();
    for child in &children {
        let Formula::Atom(axiom) = child else {
            rebuilt.push(child.clone());
            continue;
        };
        let Some((addr, flow, fields, _)) = axiom.as_memory() else {
            rebuilt.push(child.clone());
            continue;
        };
        match seen_addresses.iter().find(|(a, _)| *a == addr) {
            Some((_, representative)) => {
                let (_, rep_flow, rep_fields, _) = representative.as_memory().unwrap();
                equalities.push((rep_flow, flow));
                for (name, value) in fields {
                    if let Some(rep_value) = rep_fields.get(name) {
                        if let (Some(a), Some(b)) = (rep_value.symbol(), value.symbol()) {
                            equalities.push((a, b));
                        }
                    }
                }
            }
            None => {
                seen_addresses.push((addr, axiom.clone()));
                rebuilt.push(child.clone());
            }
        }
    }
    for (a, b) in equalities {
        rebuilt.push(Formula::atom(Axiom::stack(
            StackOp::Eq,
            Expr::variable(a),
            Expr::variable(b),
        )));
    }

    // Step 3: top-level `x = y` rewrites y -> x throughout this scope.
    let mut working = rebuilt;
    loop {
        let eq_pos = working.iter().position(|f| {
            matches!(
                f,
                Formula::Atom(Axiom::Stack {
                    op: StackOp::Eq,
                    lhs: Expr::Variable(_),
                    rhs: Expr::Variable(_),
                })
            )
        });
        let Some(pos) = eq_pos else { break };
        let Formula::Atom(Axiom::Stack {
            lhs: Expr::Variable(keep),
            rhs: Expr::Variable(drop),
            ..
        }) = working[pos]
        else {
            unreachable!()
        };
        if keep == drop {
            working.remove(pos);
            continue;
        }
        working.remove(pos);
        working = working
            .iter()
            .map(|f| rename_formula(f, &|s| if s == drop { keep } else { s }))
            .collect();
    }

    // Step 4: trivial equalities and structural duplicates.
    working.retain(|f| {
        !matches!(
            f,
            Formula::Atom(Axiom::Stack {
                op: StackOp::Eq,
                lhs,
                rhs,
            }) if lhs == rhs
        )
    });
    let mut deduped: Vec<Formula> = Vec::new();
    for f in working {
        if !deduped.contains(&f) {
            deduped.push(f);
        }
    }

    Formula::SeparatingConjunction(deduped)
}

/// `MakeStackCandidates` (the helper shared by `Join` step 5 and
/// `InlineAndSimplify`, see SPEC_FULL.md "Stack-extension / MakeStackCandidates").
/// Builds every pairwise equality/ordering candidate among `symbols` and
/// keeps the ones `check` confirms are implied by the caller's current
/// encoding. Deliberately generic over `check` so this crate stays free of
/// any SMT dependency; `keyset_smt`/`keyset_solver` supply the closure.
pub fn stack_candidates(symbols: &[SymbolId], mut check: impl FnMut(&Axiom) -> bool) -> Vec<Axiom> {
    let ops = [
        StackOp::Eq,
        StackOp::Neq,
        StackOp::Leq,
        StackOp::Lt,
        StackOp::Geq,
        StackOp::Gt,
    ];
    let mut kept = Vec::new();
    for (i, &a) in symbols.iter().enumerate() {
        for &b in &symbols[i + 1..] {
            for op in ops {
                let candidate = Axiom::stack(op, Expr::variable(a), Expr::variable(b));
                if check(&candidate) {
                    kept.push(candidate);
                }
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyset_base::{SymbolFactory, SymbolType};

    #[test]
    fn simplify_flattens_nested_conjunctions() {
        let inner = Formula::and(vec![Formula::atom(Axiom::stack(
            StackOp::Eq,
            Expr::Null,
            Expr::Null,
        ))]);
        let outer = Formula::and(vec![inner.clone(), inner]);
        let simplified = simplify(&outer);
        match simplified {
            Formula::SeparatingConjunction(cs) => assert_eq!(cs.len(), 2),
            _ => panic!("expected a conjunction"),
        }
    }

    #[test]
    fn inline_drops_trivial_equality() {
        let formula = Formula::and(vec![Formula::atom(Axiom::stack(
            StackOp::Eq,
            Expr::Null,
            Expr::Null,
        ))]);
        let result = inline_and_simplify(&formula);
        match result {
            Formula::SeparatingConjunction(cs) => assert!(cs.is_empty()),
            _ => panic!("expected a conjunction"),
        }
    }

    #[test]
    fn inline_rewrites_variable_equality() {
        let mut f = SymbolFactory::new();
        let x = f.fresh(SymbolType::Data);
        let y = f.fresh(SymbolType::Data);
        let formula = Formula::and(vec![
            Formula::atom(Axiom::stack(StackOp::Eq, Expr::variable(x), Expr::variable(y))),
            Formula::atom(Axiom::stack(StackOp::Lt, Expr::variable(y), Expr::Max)),
        ]);
        let result = inline_and_simplify(&formula);
        let syms = crate::collect::symbols_in_formula(&result);
        assert!(syms.contains(&x));
        assert!(!syms.contains(&y));
    }

    #[test]
    fn inline_deduplicates_identical_conjuncts() {
        let atom = Formula::atom(Axiom::stack(StackOp::Lt, Expr::Min, Expr::Max));
        let formula = Formula::and(vec![atom.clone(), atom]);
        let result = inline_and_simplify(&formula);
        match result {
            Formula::SeparatingConjunction(cs) => assert_eq!(cs.len(), 1),
            _ => panic!("expected a conjunction"),
        }
    }
}
