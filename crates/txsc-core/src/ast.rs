//! The TxScript abstract syntax tree.
//!
//! The external parser delivers a [`Program`]: a sequence of statements,
//! every node annotated with a [`Span`]. The tree is a closed set of tagged
//! variants -- there is no node hierarchy, no dynamic typing, and the tree
//! is never mutated after the semantic check (the optimizer's folding pass
//! produces a fresh tree).
//!
//! Builder constructors ([`Expr::int`], [`Stmt::verify`], ...) keep test
//! and front-end construction terse.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::ops::{BinaryOp, UnaryOp};
use crate::span::Span;
use crate::types::Ty;

/// An expression with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Integer literal; arbitrary precision until emit.
    Int(BigInt),
    /// Byte-string literal, already decoded from hex or string form.
    Bytes(Vec<u8>),
    /// Reference to a named binding.
    Name(String),
    /// Unary operator application.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operator application.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Call of a built-in or user-defined function.
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn int(value: impl Into<BigInt>, span: Span) -> Self {
        Expr::new(ExprKind::Int(value.into()), span)
    }

    pub fn bytes(value: Vec<u8>, span: Span) -> Self {
        Expr::new(ExprKind::Bytes(value), span)
    }

    pub fn name(name: impl Into<String>, span: Span) -> Self {
        Expr::new(ExprKind::Name(name.into()), span)
    }

    pub fn unary(op: UnaryOp, operand: Expr, span: Span) -> Self {
        Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> Self {
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, span: Span) -> Self {
        Expr::new(
            ExprKind::Call {
                name: name.into(),
                args,
            },
            span,
        )
    }
}

/// A statement with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `assume a, b, c;` -- names for values already on the runtime stack
    /// at script entry. Only valid as the first statement; the last name
    /// is the top of the stack.
    Assume { names: Vec<String> },
    /// `let [mutable] name = expr;`
    Let {
        name: String,
        mutable: bool,
        value: Expr,
    },
    /// `name = expr;` -- reassignment of a mutable binding.
    Assign { name: String, value: Expr },
    /// `if cond { ... } [else { ... }]` -- an empty `else_body` means the
    /// else branch is absent.
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// `func ty name(params) { ... return expr; }`
    FuncDecl(FuncDecl),
    /// `return expr;` -- only valid as the last statement of a function
    /// body.
    Return { value: Expr },
    /// `verify expr;` -- abort the script at runtime unless truthy.
    Verify { value: Expr },
    /// `push expr;` -- explicitly leave the value on the stack.
    Push { value: Expr },
    /// A bare expression statement; its value is implicitly pushed.
    Expr { value: Expr },
}

/// A user-defined function. Functions are inlined at every call site; the
/// declared return type is checked against the body's `return` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    pub ret_ty: Ty,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }

    pub fn assume(names: Vec<&str>, span: Span) -> Self {
        Stmt::new(
            StmtKind::Assume {
                names: names.into_iter().map(String::from).collect(),
            },
            span,
        )
    }

    pub fn let_(name: impl Into<String>, mutable: bool, value: Expr, span: Span) -> Self {
        Stmt::new(
            StmtKind::Let {
                name: name.into(),
                mutable,
                value,
            },
            span,
        )
    }

    pub fn assign(name: impl Into<String>, value: Expr, span: Span) -> Self {
        Stmt::new(
            StmtKind::Assign {
                name: name.into(),
                value,
            },
            span,
        )
    }

    pub fn if_(cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>, span: Span) -> Self {
        Stmt::new(
            StmtKind::If {
                cond,
                then_body,
                else_body,
            },
            span,
        )
    }

    pub fn return_(value: Expr, span: Span) -> Self {
        Stmt::new(StmtKind::Return { value }, span)
    }

    pub fn verify(value: Expr, span: Span) -> Self {
        Stmt::new(StmtKind::Verify { value }, span)
    }

    pub fn push(value: Expr, span: Span) -> Self {
        Stmt::new(StmtKind::Push { value }, span)
    }

    pub fn expr(value: Expr, span: Span) -> Self {
        Stmt::new(StmtKind::Expr { value }, span)
    }
}

/// A complete parsed script: the root the parser hands to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Program {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Program { stmts }
    }
}
