use keyset_base::SymbolId;
use keyset_logic::{Annotation, Axiom, Expr};

use crate::ast::ProgramExpr;
use crate::error::{EvalError, EvalResult};

/// `Evaluate(expr, state)` (spec §4.C): resolves a program expression to
/// the symbol it denotes in `state`. Pointer-sorted variables resolve via
/// the variable resource (`Axiom::EqualsTo`); dereferences resolve via the
/// memory axiom at the variable's current value.
pub fn evaluate(expr: &ProgramExpr, state: &Annotation) -> EvalResult<Expr> {
    match expr {
        ProgramExpr::Var(v) => equals_to_value(state, *v),
        ProgramExpr::Deref(v, field) => {
            let pointee = equals_to_value(state, *v)?;
            let Expr::Variable(address) = pointee else {
                return Err(EvalError::ResourceMissing {
                    symbol: *v,
                    detail: format!("{v} does not hold a memory address"),
                });
            };
            memory_field_value(state, address, field)
        }
        ProgramExpr::BoolLiteral(b) => Ok(Expr::BoolLiteral(*b)),
        ProgramExpr::Null => Ok(Expr::Null),
        ProgramExpr::Min => Ok(Expr::Min),
        ProgramExpr::Max => Ok(Expr::Max),
        ProgramExpr::SelfTid => Ok(Expr::SelfTid),
        ProgramExpr::SomeTid => Ok(Expr::SomeTid),
        ProgramExpr::Unlocked => Ok(Expr::Unlocked),
        ProgramExpr::Compare(..) | ProgramExpr::Not(_) | ProgramExpr::And(_) | ProgramExpr::Or(_) => {
            Err(EvalError::UnsupportedConstruct {
                detail: "boolean connectives do not evaluate to a single symbol; use assume translation".into(),
            })
        }
    }
}

fn equals_to_value(state: &Annotation, var: SymbolId) -> EvalResult<Expr> {
    for axiom in state.now.axioms() {
        if let Axiom::EqualsTo { program_var, value } = axiom {
            if *program_var == var {
                return Ok(*value);
            }
        }
    }
    Err(EvalError::ResourceMissing {
        symbol: var,
        detail: "no variable resource for this program variable".into(),
    })
}

fn memory_field_value(state: &Annotation, address: SymbolId, field: &str) -> EvalResult<Expr> {
    for axiom in state.now.axioms() {
        if let Axiom::Memory {
            address: a, fields, ..
        } = axiom
        {
            if *a == address {
                return fields.get(field).copied().ok_or_else(|| EvalError::ResourceMissing {
                    symbol: address,
                    detail: format!("memory at {address} has no field `{field}`"),
                });
            }
        }
    }
    Err(EvalError::ResourceMissing {
        symbol: address,
        detail: "no memory resource at this address".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyset_base::{SymbolFactory, SymbolType};
    use keyset_logic::{Formula, Locality};
    use std::collections::BTreeMap;

    #[test]
    fn evaluates_plain_variable() {
        let mut f = SymbolFactory::new();
        let head = f.fresh(SymbolType::Pointer);
        let value = f.fresh(SymbolType::Pointer);
        let state = Annotation::new(Formula::and(vec![Formula::atom(Axiom::EqualsTo {
            program_var: head,
            value: Expr::variable(value),
        })]));
        assert_eq!(evaluate(&ProgramExpr::Var(head), &state).unwrap(), Expr::variable(value));
    }

    #[test]
    fn evaluates_dereference() {
        let mut f = SymbolFactory::new();
        let head = f.fresh(SymbolType::Pointer);
        let address = f.fresh(SymbolType::Pointer);
        let flow = f.fresh(SymbolType::Flow);
        let data = f.fresh(SymbolType::Data);
        let mut fields = BTreeMap::new();
        fields.insert("data".to_string(), Expr::variable(data));
        let state = Annotation::new(Formula::and(vec![
            Formula::atom(Axiom::EqualsTo {
                program_var: head,
                value: Expr::variable(address),
            }),
            Formula::atom(Axiom::memory(address, flow, fields, Locality::Shared)),
        ]));
        let result = evaluate(&ProgramExpr::Deref(head, "data".into()), &state).unwrap();
        assert_eq!(result, Expr::variable(data));
    }

    #[test]
    fn missing_variable_resource_is_an_error() {
        let mut f = SymbolFactory::new();
        let head = f.fresh(SymbolType::Pointer);
        let state = Annotation::new(Formula::empty());
        assert!(evaluate(&ProgramExpr::Var(head), &state).is_err());
    }
}
