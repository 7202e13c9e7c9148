//! Operator enums for TxScript expressions.
//!
//! Operators are grouped into small sub-enums by family -- arithmetic,
//! bitwise, comparison, boolean -- and wrapped by [`BinaryOp`] so a single
//! AST node kind covers every binary expression. Type requirements live
//! with the operator: the arithmetic, bitwise, and boolean families demand
//! `Int` operands; equality accepts any matching pair.

use serde::{Deserialize, Serialize};

/// Binary arithmetic operators. Operands and result are `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    /// Truncating division (toward zero), matching the target machine.
    Div,
    /// Remainder; the sign follows the dividend.
    Mod,
}

/// Bitwise and shift operators. Operands and result are `Int`; semantics
/// are numeric (arbitrary-precision two's complement), not byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Comparison operators. `Eq`/`Ne` accept any matching operand pair;
/// the orderings require `Int`. All produce `Int` (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// `Eq` and `Ne` -- the operators that accept `Bytes` operands.
    pub fn is_equality(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }
}

/// Boolean connectives (`and`, `or` keywords). No short-circuiting: both
/// operands are always evaluated, as the target machine has no jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

/// Unary operators: numeric negation, boolean not, bitwise invert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Invert,
}

/// Any binary operator, grouped by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Arith(ArithOp),
    Bit(BitOp),
    Cmp(CmpOp),
    Bool(BoolOp),
}

impl BinaryOp {
    /// Returns `true` when both operands must be `Int`. Only equality
    /// comparisons are exempt.
    pub fn requires_int_operands(self) -> bool {
        match self {
            BinaryOp::Arith(_) | BinaryOp::Bit(_) | BinaryOp::Bool(_) => true,
            BinaryOp::Cmp(op) => !op.is_equality(),
        }
    }
}
