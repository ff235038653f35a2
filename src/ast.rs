//! A minimal, programmatically-constructed expression tree.
//!
//! This is deliberately *not* a Self-syntax AST produced by a lexer and
//! parser — those are out-of-scope external collaborators (spec §1, §6.2).
//! `Expr` exists only so `eval.rs` and the integration tests have something
//! concrete to feed through the lookup engine and heap when exercising the
//! spec §8 end-to-end scenarios (hello world, lookup through parents, cycle
//! tolerance, assignment via setter, ...).

#[derive(Debug, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f32),
    String(String),
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value, allocated fresh each time it is evaluated.
    Literal(Literal),
    /// The implicit receiver of the enclosing method/block.
    SelfRef,
    /// The `index`-th argument of the enclosing method/block invocation.
    Argument(usize),
    /// Sends `selector` to the value `receiver` evaluates to, with `args`
    /// evaluated left-to-right.
    Send { receiver: Box<Expr>, selector: String, args: Vec<Expr> },
    /// A sequence of expressions; the last expression's value is returned.
    Sequence(Vec<Expr>),
    /// `^expr`: a non-local return to the enclosing method's activation
    /// (spec §4.5).
    Return(Box<Expr>),
}

impl Expr {
    pub fn send(receiver: Expr, selector: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Send { receiver: Box::new(receiver), selector: selector.into(), args }
    }

    pub fn unary(receiver: Expr, selector: impl Into<String>) -> Expr {
        Expr::send(receiver, selector, Vec::new())
    }
}
