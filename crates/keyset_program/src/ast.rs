use keyset_base::SymbolId;
use keyset_logic::StackOp;

/// A program-level expression (spec §4.C). Unlike [`keyset_logic::Expr`]
/// this can be a dereference or a boolean connective; `Evaluate` resolves
/// the value-producing subset (`Var`, `Deref`, the constant leaves) to a
/// [`keyset_logic::Expr`], while the boolean-connective subset is only ever
/// consumed by `assume` translation in `keyset_solver`, never by
/// `Evaluate` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramExpr {
    Var(SymbolId),
    /// `var.field`, a single-level heap dereference.
    Deref(SymbolId, String),
    BoolLiteral(bool),
    Null,
    Min,
    Max,
    SelfTid,
    SomeTid,
    Unlocked,
    Compare(StackOp, Box<ProgramExpr>, Box<ProgramExpr>),
    Not(Box<ProgramExpr>),
    And(Vec<ProgramExpr>),
    Or(Vec<ProgramExpr>),
}

/// A single non-control-flow command (spec §4.F / §4.G).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Assign {
        lhs: SymbolId,
        rhs: ProgramExpr,
    },
    Write {
        address_var: SymbolId,
        field: String,
        value: ProgramExpr,
    },
    Malloc {
        lhs: SymbolId,
    },
    Assume(ProgramExpr),
    LockAcquire {
        var: SymbolId,
        field: String,
    },
    LockRelease {
        var: SymbolId,
        field: String,
    },
}

/// The program AST the driver traverses (spec §4.L visit rules).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Sequence(Box<Statement>, Box<Statement>),
    /// Introduces the listed program variables for the body's duration.
    Scope(Vec<SymbolId>, Box<Statement>),
    Atomic(Box<Statement>),
    Choice(Vec<Statement>),
    UnconditionalLoop(Box<Statement>),
    Break,
    Return(Option<ProgramExpr>),
    Fail,
    Skip,
    Command(Command),
    /// A non-recursive call to another interface function's macro body
    /// (spec §4.L "Macros"), by name.
    Call(String),
}

impl Statement {
    pub fn seq(a: Statement, b: Statement) -> Statement {
        Statement::Sequence(Box::new(a), Box::new(b))
    }

    pub fn atomic(body: Statement) -> Statement {
        Statement::Atomic(Box::new(body))
    }

    pub fn loop_forever(body: Statement) -> Statement {
        Statement::UnconditionalLoop(Box::new(body))
    }
}

/// An interface function: a name, the specification kind/key it must
/// discharge, and a body to traverse (spec §4.L "Per interface function").
///
/// `key_var` is the program variable the caller's specification key is
/// bound to for the duration of the body; the driver seeds it into the
/// initial annotation before the body runs, so `body` should treat it as
/// already in scope rather than introducing it again via its own top-level
/// [`Statement::Scope`].
#[derive(Debug, Clone)]
pub struct InterfaceFunction {
    pub name: String,
    pub spec: keyset_logic::SpecKind,
    pub key_var: SymbolId,
    pub body: Statement,
}
