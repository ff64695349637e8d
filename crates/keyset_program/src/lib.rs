//! Program AST and symbolic evaluation.
//!
//! Parsing of a concrete source language is explicitly out of scope (spec
//! §1): programs arrive already as a [`ast::Statement`] tree referencing
//! program variables by [`keyset_base::SymbolId`], the same identity the
//! symbolic logic layer uses for everything else.

pub mod ast;
pub mod error;
pub mod evaluate;

pub use ast::{Command, InterfaceFunction, ProgramExpr, Statement};
pub use error::{EvalError, EvalResult};
pub use evaluate::evaluate;
