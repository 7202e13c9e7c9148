//! The target opcode set.
//!
//! A closed enum of the opcodes the code generator can emit, with their
//! canonical byte values and per-opcode arity metadata (stack items
//! consumed and produced). Variable-arity opcodes (`OP_PICK`, `OP_ROLL`,
//! `OP_CHECKMULTISIG*`) report `None` and are handled specially by the
//! virtual stack.
//!
//! Push encodings (`OP_0`..`OP_16`, `OP_1NEGATE`, length-prefixed data,
//! `OP_PUSHDATA1/2/4`) are not opcodes in this enum; pushes are first-class
//! IR instructions and the emitter owns their byte forms.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One executable opcode of the target stack machine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Flow control
    If = 0x63,
    NotIf = 0x64,
    Else = 0x67,
    EndIf = 0x68,
    Verify = 0x69,
    Return = 0x6a,

    // Stack shuffling
    Drop = 0x75,
    Dup = 0x76,
    Nip = 0x77,
    Over = 0x78,
    Pick = 0x79,
    Roll = 0x7a,
    Rot = 0x7b,
    Swap = 0x7c,
    Tuck = 0x7d,

    // Splice
    Cat = 0x7e,
    Substr = 0x7f,
    Left = 0x80,
    Right = 0x81,
    Size = 0x82,

    // Bitwise
    Invert = 0x83,
    And = 0x84,
    Or = 0x85,
    Xor = 0x86,
    Equal = 0x87,
    EqualVerify = 0x88,

    // Numeric
    Negate = 0x8f,
    Abs = 0x90,
    Not = 0x91,
    ZeroNotEqual = 0x92,
    Add = 0x93,
    Sub = 0x94,
    Mul = 0x95,
    Div = 0x96,
    Mod = 0x97,
    LShift = 0x98,
    RShift = 0x99,
    BoolAnd = 0x9a,
    BoolOr = 0x9b,
    NumEqual = 0x9c,
    NumEqualVerify = 0x9d,
    NumNotEqual = 0x9e,
    LessThan = 0x9f,
    GreaterThan = 0xa0,
    LessThanOrEqual = 0xa1,
    GreaterThanOrEqual = 0xa2,
    Min = 0xa3,
    Max = 0xa4,
    Within = 0xa5,

    // Crypto
    Ripemd160 = 0xa6,
    Sha1 = 0xa7,
    Sha256 = 0xa8,
    Hash160 = 0xa9,
    Hash256 = 0xaa,
    CheckSig = 0xac,
    CheckSigVerify = 0xad,
    CheckMultiSig = 0xae,
    CheckMultiSigVerify = 0xaf,
}

/// Every opcode, in byte order. Drives the name/byte lookup tables.
pub const ALL_OPCODES: &[Opcode] = &[
    Opcode::If,
    Opcode::NotIf,
    Opcode::Else,
    Opcode::EndIf,
    Opcode::Verify,
    Opcode::Return,
    Opcode::Drop,
    Opcode::Dup,
    Opcode::Nip,
    Opcode::Over,
    Opcode::Pick,
    Opcode::Roll,
    Opcode::Rot,
    Opcode::Swap,
    Opcode::Tuck,
    Opcode::Cat,
    Opcode::Substr,
    Opcode::Left,
    Opcode::Right,
    Opcode::Size,
    Opcode::Invert,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Equal,
    Opcode::EqualVerify,
    Opcode::Negate,
    Opcode::Abs,
    Opcode::Not,
    Opcode::ZeroNotEqual,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::LShift,
    Opcode::RShift,
    Opcode::BoolAnd,
    Opcode::BoolOr,
    Opcode::NumEqual,
    Opcode::NumEqualVerify,
    Opcode::NumNotEqual,
    Opcode::LessThan,
    Opcode::GreaterThan,
    Opcode::LessThanOrEqual,
    Opcode::GreaterThanOrEqual,
    Opcode::Min,
    Opcode::Max,
    Opcode::Within,
    Opcode::Ripemd160,
    Opcode::Sha1,
    Opcode::Sha256,
    Opcode::Hash160,
    Opcode::Hash256,
    Opcode::CheckSig,
    Opcode::CheckSigVerify,
    Opcode::CheckMultiSig,
    Opcode::CheckMultiSigVerify,
];

impl Opcode {
    /// The canonical `OP_*` name used in textual output.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::If => "OP_IF",
            Opcode::NotIf => "OP_NOTIF",
            Opcode::Else => "OP_ELSE",
            Opcode::EndIf => "OP_ENDIF",
            Opcode::Verify => "OP_VERIFY",
            Opcode::Return => "OP_RETURN",
            Opcode::Drop => "OP_DROP",
            Opcode::Dup => "OP_DUP",
            Opcode::Nip => "OP_NIP",
            Opcode::Over => "OP_OVER",
            Opcode::Pick => "OP_PICK",
            Opcode::Roll => "OP_ROLL",
            Opcode::Rot => "OP_ROT",
            Opcode::Swap => "OP_SWAP",
            Opcode::Tuck => "OP_TUCK",
            Opcode::Cat => "OP_CAT",
            Opcode::Substr => "OP_SUBSTR",
            Opcode::Left => "OP_LEFT",
            Opcode::Right => "OP_RIGHT",
            Opcode::Size => "OP_SIZE",
            Opcode::Invert => "OP_INVERT",
            Opcode::And => "OP_AND",
            Opcode::Or => "OP_OR",
            Opcode::Xor => "OP_XOR",
            Opcode::Equal => "OP_EQUAL",
            Opcode::EqualVerify => "OP_EQUALVERIFY",
            Opcode::Negate => "OP_NEGATE",
            Opcode::Abs => "OP_ABS",
            Opcode::Not => "OP_NOT",
            Opcode::ZeroNotEqual => "OP_0NOTEQUAL",
            Opcode::Add => "OP_ADD",
            Opcode::Sub => "OP_SUB",
            Opcode::Mul => "OP_MUL",
            Opcode::Div => "OP_DIV",
            Opcode::Mod => "OP_MOD",
            Opcode::LShift => "OP_LSHIFT",
            Opcode::RShift => "OP_RSHIFT",
            Opcode::BoolAnd => "OP_BOOLAND",
            Opcode::BoolOr => "OP_BOOLOR",
            Opcode::NumEqual => "OP_NUMEQUAL",
            Opcode::NumEqualVerify => "OP_NUMEQUALVERIFY",
            Opcode::NumNotEqual => "OP_NUMNOTEQUAL",
            Opcode::LessThan => "OP_LESSTHAN",
            Opcode::GreaterThan => "OP_GREATERTHAN",
            Opcode::LessThanOrEqual => "OP_LESSTHANOREQUAL",
            Opcode::GreaterThanOrEqual => "OP_GREATERTHANOREQUAL",
            Opcode::Min => "OP_MIN",
            Opcode::Max => "OP_MAX",
            Opcode::Within => "OP_WITHIN",
            Opcode::Ripemd160 => "OP_RIPEMD160",
            Opcode::Sha1 => "OP_SHA1",
            Opcode::Sha256 => "OP_SHA256",
            Opcode::Hash160 => "OP_HASH160",
            Opcode::Hash256 => "OP_HASH256",
            Opcode::CheckSig => "OP_CHECKSIG",
            Opcode::CheckSigVerify => "OP_CHECKSIGVERIFY",
            Opcode::CheckMultiSig => "OP_CHECKMULTISIG",
            Opcode::CheckMultiSigVerify => "OP_CHECKMULTISIGVERIFY",
        }
    }

    /// The consensus byte value.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Opcode::to_byte`].
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        ALL_OPCODES.iter().copied().find(|op| op.to_byte() == byte)
    }

    /// Inverse of [`Opcode::name`].
    pub fn from_name(name: &str) -> Option<Opcode> {
        ALL_OPCODES.iter().copied().find(|op| op.name() == name)
    }

    /// `(inputs consumed, outputs produced)`, or `None` for opcodes whose
    /// arity depends on operand values (`OP_PICK`, `OP_ROLL`,
    /// `OP_CHECKMULTISIG*`).
    pub fn arity(self) -> Option<(u32, u32)> {
        let pair = match self {
            Opcode::If | Opcode::NotIf => (1, 0),
            Opcode::Else | Opcode::EndIf => (0, 0),
            Opcode::Verify => (1, 0),
            Opcode::Return => (0, 0),
            Opcode::Drop => (1, 0),
            Opcode::Dup => (1, 2),
            Opcode::Nip => (2, 1),
            Opcode::Over => (2, 3),
            Opcode::Pick | Opcode::Roll => return None,
            Opcode::Rot => (3, 3),
            Opcode::Swap => (2, 2),
            Opcode::Tuck => (2, 3),
            Opcode::Cat => (2, 1),
            Opcode::Substr => (3, 1),
            Opcode::Left | Opcode::Right => (2, 1),
            // OP_SIZE peeks: the operand stays beneath the size.
            Opcode::Size => (1, 2),
            Opcode::Invert => (1, 1),
            Opcode::And | Opcode::Or | Opcode::Xor => (2, 1),
            Opcode::Equal => (2, 1),
            Opcode::EqualVerify => (2, 0),
            Opcode::Negate | Opcode::Abs | Opcode::Not | Opcode::ZeroNotEqual => (1, 1),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::LShift
            | Opcode::RShift
            | Opcode::BoolAnd
            | Opcode::BoolOr
            | Opcode::NumEqual
            | Opcode::NumNotEqual
            | Opcode::LessThan
            | Opcode::GreaterThan
            | Opcode::LessThanOrEqual
            | Opcode::GreaterThanOrEqual
            | Opcode::Min
            | Opcode::Max => (2, 1),
            Opcode::NumEqualVerify => (2, 0),
            Opcode::Within => (3, 1),
            Opcode::Ripemd160
            | Opcode::Sha1
            | Opcode::Sha256
            | Opcode::Hash160
            | Opcode::Hash256 => (1, 1),
            Opcode::CheckSig => (2, 1),
            Opcode::CheckSigVerify => (2, 0),
            Opcode::CheckMultiSig | Opcode::CheckMultiSigVerify => return None,
        };
        Some(pair)
    }

    /// Opcodes the optimizer must never reorder, duplicate, or delete:
    /// they can abort the script or carry an external obligation.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            Opcode::Verify
                | Opcode::Return
                | Opcode::EqualVerify
                | Opcode::NumEqualVerify
                | Opcode::CheckSig
                | Opcode::CheckSigVerify
                | Opcode::CheckMultiSig
                | Opcode::CheckMultiSigVerify
        )
    }

    /// Returns `true` for the `OP_IF`/`OP_ELSE`/`OP_ENDIF` family.
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            Opcode::If | Opcode::NotIf | Opcode::Else | Opcode::EndIf
        )
    }

    /// The fused `*VERIFY` form of this opcode, if one exists. The
    /// peephole pass rewrites `<op> OP_VERIFY` into it.
    pub fn verify_variant(self) -> Option<Opcode> {
        match self {
            Opcode::Equal => Some(Opcode::EqualVerify),
            Opcode::NumEqual => Some(Opcode::NumEqualVerify),
            Opcode::CheckSig => Some(Opcode::CheckSigVerify),
            Opcode::CheckMultiSig => Some(Opcode::CheckMultiSigVerify),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
