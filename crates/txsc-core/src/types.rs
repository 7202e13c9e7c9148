//! The TxScript type system.
//!
//! Exactly three types exist: [`Ty::Int`], [`Ty::Bytes`], and [`Ty::Expr`],
//! the polymorphic "not statically known" type that values of unknown
//! provenance (stack assumptions, heterogeneous conditional results) carry.
//! Arithmetic requires `Int`, splicing requires `Bytes`, equality accepts
//! any matching pair, and `Expr` unifies with everything.
//!
//! [`ConstValue`] is the compile-time counterpart: a fully evaluated
//! constant produced by folding, stored in constant bindings and compared
//! with script truthiness semantics.

use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::script::cast_to_bool;

/// Static type of a TxScript expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ty {
    /// Arbitrary-precision integer (script number on the target machine).
    Int,
    /// Raw byte string.
    Bytes,
    /// Statically unknown; unifies with either concrete type.
    Expr,
}

impl Ty {
    /// Whether a value of type `self` is acceptable where `other` is
    /// expected. `Expr` on either side unifies.
    pub fn unifies(self, other: Ty) -> bool {
        self == other || self == Ty::Expr || other == Ty::Expr
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ty::Int => "int",
            Ty::Bytes => "bytes",
            Ty::Expr => "expr",
        };
        write!(f, "{}", name)
    }
}

/// A fully evaluated compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(BigInt),
    Bytes(Vec<u8>),
}

impl ConstValue {
    /// The static type of this constant.
    pub fn ty(&self) -> Ty {
        match self {
            ConstValue::Int(_) => Ty::Int,
            ConstValue::Bytes(_) => Ty::Bytes,
        }
    }

    /// Script truthiness: nonzero integers and byte strings that cast to
    /// true under the target machine's boolean rules (negative zero is
    /// false).
    pub fn is_truthy(&self) -> bool {
        match self {
            ConstValue::Int(n) => !n.is_zero(),
            ConstValue::Bytes(b) => cast_to_bool(b),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(n) => write!(f, "{}", n),
            ConstValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}
