//! The linear opcode IR and the script-number codec.
//!
//! A [`Script`] is a flat sequence of [`OpInstr`] values built append-only
//! during lowering and rewritten in place by the optimizer. There are no
//! labels and no jumps beyond `OP_IF`/`OP_ELSE`/`OP_ENDIF`.
//!
//! Script numbers are encoded little-endian with the sign bit in the high
//! byte and no superfluous trailing byte (minimal encoding). Encoding is
//! arbitrary-precision here; the 4-byte consensus limit is the emitter's
//! concern.

use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::opcode::Opcode;

/// One instruction of the opcode IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpInstr {
    /// An executable opcode.
    Op(Opcode),
    /// Push of an integer value (encoded minimally at emit).
    PushInt(BigInt),
    /// Push of a raw byte string.
    PushBytes(Vec<u8>),
}

impl OpInstr {
    /// Returns `true` for the two push variants.
    pub fn is_push(&self) -> bool {
        matches!(self, OpInstr::PushInt(_) | OpInstr::PushBytes(_))
    }

    pub fn push_int(value: impl Into<BigInt>) -> Self {
        OpInstr::PushInt(value.into())
    }
}

/// A flat opcode sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub instrs: Vec<OpInstr>,
}

impl Script {
    pub fn new() -> Self {
        Script { instrs: Vec::new() }
    }

    pub fn push(&mut self, instr: OpInstr) {
        self.instrs.push(instr);
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OpInstr> {
        self.instrs.iter()
    }

    /// Canonicalizes pushes so that emit/disassemble round-trips are
    /// IR-exact: integers outside the `OP_1NEGATE`..`OP_16` range become
    /// minimal script-number byte pushes, and an empty byte push becomes
    /// `PushInt(0)` (both encode as `OP_0`).
    pub fn normalized(&self) -> Script {
        let instrs = self
            .instrs
            .iter()
            .map(|instr| match instr {
                OpInstr::PushInt(n) => {
                    let small = n.to_i64().map_or(false, |v| (-1..=16).contains(&v));
                    if small {
                        OpInstr::PushInt(n.clone())
                    } else {
                        OpInstr::PushBytes(scriptnum_encode(n).to_vec())
                    }
                }
                OpInstr::PushBytes(b) if b.is_empty() => OpInstr::push_int(0),
                other => other.clone(),
            })
            .collect();
        Script { instrs }
    }
}

impl FromIterator<OpInstr> for Script {
    fn from_iter<I: IntoIterator<Item = OpInstr>>(iter: I) -> Self {
        Script {
            instrs: iter.into_iter().collect(),
        }
    }
}

/// Encodes a script number: little-endian magnitude, sign bit in the most
/// significant byte, zero as the empty string.
pub fn scriptnum_encode(n: &BigInt) -> SmallVec<[u8; 8]> {
    let mut out = SmallVec::new();
    if n.is_zero() {
        return out;
    }
    let negative = n.sign() == Sign::Minus;
    let (_, mut bytes) = n.to_bytes_le();
    let high_bit_set = bytes.last().map_or(false, |b| b & 0x80 != 0);
    if high_bit_set {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        if let Some(last) = bytes.last_mut() {
            *last |= 0x80;
        }
    }
    out.extend_from_slice(&bytes);
    out
}

/// Decodes a script number. Accepts any length; the consensus 4-byte cap
/// is not this codec's business.
pub fn scriptnum_decode(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    let mut magnitude = bytes.to_vec();
    let last = *magnitude.last().expect("non-empty");
    let negative = last & 0x80 != 0;
    *magnitude.last_mut().expect("non-empty") = last & 0x7f;
    let n = BigInt::from_bytes_le(Sign::Plus, &magnitude);
    if negative {
        -n
    } else {
        n
    }
}

/// The target machine's boolean cast: false for the empty string, any
/// all-zero string, and negative zero (`0x80` in the final position with
/// zeroes before it).
pub fn cast_to_bool(bytes: &[u8]) -> bool {
    for (i, byte) in bytes.iter().enumerate() {
        if *byte != 0 {
            if i == bytes.len() - 1 && *byte == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scriptnum_known_encodings() {
        let cases: Vec<(i64, Vec<u8>)> = vec![
            (0, vec![]),
            (1, vec![0x01]),
            (-1, vec![0x81]),
            (16, vec![0x10]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x00]),
            (-128, vec![0x80, 0x80]),
            (255, vec![0xff, 0x00]),
            (256, vec![0x00, 0x01]),
            (1000, vec![0xe8, 0x03]),
            (-1000, vec![0xe8, 0x83]),
        ];
        for (value, expected) in cases {
            let encoded = scriptnum_encode(&BigInt::from(value));
            assert_eq!(encoded.as_slice(), expected.as_slice(), "value {}", value);
            assert_eq!(scriptnum_decode(&encoded), BigInt::from(value));
        }
    }

    #[test]
    fn cast_to_bool_edge_cases() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00]));
        assert!(!cast_to_bool(&[0x00, 0x00]));
        assert!(!cast_to_bool(&[0x00, 0x80])); // negative zero
        assert!(cast_to_bool(&[0x80, 0x00])); // 128, not negative zero
        assert!(cast_to_bool(&[0x01]));
        assert!(cast_to_bool(&[0x00, 0x01]));
    }

    #[test]
    fn normalized_converts_large_ints_to_byte_pushes() {
        let script: Script = vec![
            OpInstr::push_int(4),
            OpInstr::push_int(1000),
            OpInstr::push_int(-1),
            OpInstr::PushBytes(vec![]),
        ]
        .into_iter()
        .collect();

        let normal = script.normalized();
        assert_eq!(normal.instrs[0], OpInstr::push_int(4));
        assert_eq!(normal.instrs[1], OpInstr::PushBytes(vec![0xe8, 0x03]));
        assert_eq!(normal.instrs[2], OpInstr::push_int(-1));
        assert_eq!(normal.instrs[3], OpInstr::push_int(0));
    }

    #[test]
    fn normalized_is_idempotent() {
        let script: Script = vec![
            OpInstr::push_int(70000),
            OpInstr::Op(Opcode::Dup),
            OpInstr::PushBytes(vec![0xaa; 3]),
        ]
        .into_iter()
        .collect();
        let once = script.normalized();
        assert_eq!(once, once.normalized());
    }

    proptest! {
        #[test]
        fn scriptnum_roundtrip(v in -1_000_000_000_000i64..1_000_000_000_000i64) {
            let n = BigInt::from(v);
            let encoded = scriptnum_encode(&n);
            prop_assert_eq!(scriptnum_decode(&encoded), n);
            // Minimality: the top payload byte is never a bare sign byte.
            if encoded.len() >= 2 {
                let last = encoded[encoded.len() - 1];
                let prev = encoded[encoded.len() - 2];
                prop_assert!(!(last == 0x00 && prev & 0x80 == 0));
                prop_assert!(!(last == 0x80 && prev & 0x80 == 0));
            }
        }
    }
}
