//! Compiled code as carried by `Method` and `Block` objects (spec §4.5).
//!
//! The real evaluator compiles an AST into bytecode; that compiler is an
//! external collaborator (spec §1, §6.2). This core only needs a place to
//! hang "the code" off a Method/Block object, so `CodeBlock` wraps either a
//! primitive's name (resolved through `primitive::lookup`) or a reference
//! to the tiny demo `ast::Expr` tree used to exercise the lookup engine
//! end-to-end (see SPEC_FULL.md §C.3).

use crate::ast::Expr;
use std::rc::Rc;

#[derive(Clone)]
pub enum CodeBlock {
    Primitive(&'static str),
    Body(Rc<Expr>),
}

impl std::fmt::Debug for CodeBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeBlock::Primitive(name) => write!(f, "Primitive({})", name),
            CodeBlock::Body(_) => write!(f, "Body(..)"),
        }
    }
}
