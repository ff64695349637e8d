//! Built-in demonstration programs.
//!
//! `krill` has no front end for a concrete source language (parsing is
//! explicitly out of scope for the core engine); a "program file" instead
//! names one of the scenarios registered here. Each scenario pre-allocates
//! its own [`SymbolFactory`] and [`FlowConfig`], and returns the interface
//! functions [`keyset_proof::verify_program`] checks.
//!
//! `contains` and `locked-contains` each model a single cell that is
//! malloc'd and never linked into anything else; `link-two-cells` mallocs
//! two and links them, giving the footprint a root plus one non-root
//! successor. None of the three ever routes a key out of any field (their
//! `IsolatedNodeConfig::outflow_contains` always answers `false`), so every
//! inflow stays empty and `pre_keyset`/`post_keyset` — only ever
//! constrained to be subsets of inflow — are forced empty too: no node
//! ever logically contains any key, before or after its write. A
//! `contains` check against any of them is therefore always correctly
//! `false`, which exercises the full pipeline — footprint construction,
//! the SMT encoding, every post-image check, obligation discharge, and the
//! linearizability check at `Return` — without needing a way to bootstrap
//! an already-shared structure, which this AST has no statement for (every
//! function starts from nothing but its own obligation and key bounds).

use keyset_base::{SymbolFactory, SymbolId, SymbolType};
use keyset_flow::FlowConfig;
use keyset_logic::{Axiom, Expr, Formula, SpecKind, StackOp};
use keyset_program::{Command, InterfaceFunction, ProgramExpr, Statement};

/// The names of the built-in scenarios [`load`] recognizes.
pub const SCENARIOS: &[&str] = &["contains", "locked-contains", "link-two-cells"];

/// A scenario ready to hand to [`keyset_proof::verify_program`].
pub struct Scenario {
    pub factory: SymbolFactory,
    pub config: IsolatedNodeConfig,
    pub functions: Vec<InterfaceFunction>,
}

/// Looks up a built-in scenario by name (one of [`SCENARIOS`]).
pub fn load(name: &str) -> Option<Scenario> {
    match name {
        "contains" => Some(contains_scenario()),
        "locked-contains" => Some(locked_contains_scenario()),
        "link-two-cells" => Some(link_two_cells_scenario()),
        _ => None,
    }
}

/// A never-shared single-cell node type: one pointer field (`next`) and
/// one lock field (`lock`), no fields that ever carry a searchable key.
pub struct IsolatedNodeConfig {
    pointer_fields: Vec<String>,
    data_fields: Vec<String>,
}

impl IsolatedNodeConfig {
    fn new() -> Self {
        Self {
            pointer_fields: vec!["next".to_string()],
            data_fields: vec!["lock".to_string()],
        }
    }
}

impl FlowConfig for IsolatedNodeConfig {
    fn flow_value_type(&self) -> SymbolType {
        SymbolType::Data
    }

    fn pointer_fields(&self) -> &[String] {
        &self.pointer_fields
    }

    fn data_fields(&self) -> &[String] {
        &self.data_fields
    }

    fn field_type(&self, field: &str) -> SymbolType {
        match field {
            "lock" => SymbolType::ThreadId,
            _ => SymbolType::Data,
        }
    }

    fn max_footprint_depth(&self, _field: &str) -> usize {
        1
    }

    fn outflow_contains(&self, _memory: &Axiom, _field: &str, _value: Expr) -> Formula {
        false_formula()
    }

    fn logically_contains(&self, _memory: &Axiom, _value: Expr) -> Formula {
        false_formula()
    }

    fn shared_node_invariant(&self, _memory: &Axiom) -> Vec<Formula> {
        Vec::new()
    }

    fn local_node_invariant(&self, _memory: &Axiom) -> Vec<Formula> {
        Vec::new()
    }

    fn shared_variable_invariant(&self, _variable: SymbolId, _value: Expr) -> Vec<Formula> {
        Vec::new()
    }
}

/// `false`, spelled as a formula: this node type never routes a key out of
/// any field, and never logically contains one.
fn false_formula() -> Formula {
    Formula::atom(Axiom::stack(StackOp::Neq, Expr::Null, Expr::Null))
}

fn contains_scenario() -> Scenario {
    let mut factory = SymbolFactory::new();
    let key_var = factory.fresh_named("key", SymbolType::Data);
    let n = factory.fresh_named("n", SymbolType::Pointer);

    let body = Statement::Scope(
        vec![n],
        Box::new(Statement::seq(
            Statement::Command(Command::Malloc { lhs: n }),
            Statement::seq(
                Statement::Command(Command::Write {
                    address_var: n,
                    field: "next".to_string(),
                    value: ProgramExpr::Null,
                }),
                Statement::Return(Some(ProgramExpr::BoolLiteral(false))),
            ),
        )),
    );

    let function = InterfaceFunction {
        name: "contains".to_string(),
        spec: SpecKind::Contains,
        key_var,
        body,
    };

    Scenario {
        factory,
        config: IsolatedNodeConfig::new(),
        functions: vec![function],
    }
}

/// Same as [`contains_scenario`], but additionally exercises lock
/// acquire/release around the write (spec §4.G `LockAcquire`/`LockRelease`,
/// grounded on the original's `locks.cpp`).
fn locked_contains_scenario() -> Scenario {
    let mut factory = SymbolFactory::new();
    let key_var = factory.fresh_named("key", SymbolType::Data);
    let n = factory.fresh_named("n", SymbolType::Pointer);

    let acquire_guard = Statement::Command(Command::Assume(ProgramExpr::Compare(
        StackOp::Eq,
        Box::new(ProgramExpr::Deref(n, "lock".to_string())),
        Box::new(ProgramExpr::Unlocked),
    )));

    let body = Statement::Scope(
        vec![n],
        Box::new(Statement::seq(
            Statement::Command(Command::Malloc { lhs: n }),
            Statement::seq(
                acquire_guard,
                Statement::seq(
                    Statement::Command(Command::LockAcquire { var: n, field: "lock".to_string() }),
                    Statement::seq(
                        Statement::Command(Command::Write {
                            address_var: n,
                            field: "next".to_string(),
                            value: ProgramExpr::Null,
                        }),
                        Statement::seq(
                            Statement::Command(Command::LockRelease { var: n, field: "lock".to_string() }),
                            Statement::Return(Some(ProgramExpr::BoolLiteral(false))),
                        ),
                    ),
                ),
            ),
        )),
    );

    let function = InterfaceFunction {
        name: "locked_contains".to_string(),
        spec: SpecKind::Contains,
        key_var,
        body,
    };

    Scenario {
        factory,
        config: IsolatedNodeConfig::new(),
        functions: vec![function],
    }
}

/// Mallocs two cells and links the first's `next` to the second before
/// returning, so the footprint the write builds has two nodes rather than
/// one: the root (the cell being written) and a non-root successor pulled
/// in by the BFS. Both cells stay local throughout (never escape to a
/// shared variable), so the write remains as sound as the single-cell
/// scenarios, but it now exercises the edge-propagation half of flow
/// encoding (`encode::encode_field_flow`) rather than just the per-node
/// half a single cell alone could ever reach.
fn link_two_cells_scenario() -> Scenario {
    let mut factory = SymbolFactory::new();
    let key_var = factory.fresh_named("key", SymbolType::Data);
    let n = factory.fresh_named("n", SymbolType::Pointer);
    let m = factory.fresh_named("m", SymbolType::Pointer);

    let body = Statement::Scope(
        vec![n, m],
        Box::new(Statement::seq(
            Statement::Command(Command::Malloc { lhs: n }),
            Statement::seq(
                Statement::Command(Command::Malloc { lhs: m }),
                Statement::seq(
                    Statement::Command(Command::Write {
                        address_var: n,
                        field: "next".to_string(),
                        value: ProgramExpr::Var(m),
                    }),
                    Statement::Return(Some(ProgramExpr::BoolLiteral(false))),
                ),
            ),
        )),
    );

    let function = InterfaceFunction {
        name: "link_two_cells".to_string(),
        spec: SpecKind::Contains,
        key_var,
        body,
    };

    Scenario {
        factory,
        config: IsolatedNodeConfig::new(),
        functions: vec![function],
    }
}
