//! Emitter and disassembler for the opcode IR.
//!
//! Textual output is space-separated uppercase tokens with hex pushes
//! prefixed by their length (`OP_DUP OP_HASH160 0x14 1010...10
//! OP_EQUALVERIFY OP_CHECKSIG`); binary output is the canonical consensus
//! encoding (`OP_0`..`OP_16`, `OP_1NEGATE`, direct length bytes,
//! `OP_PUSHDATA1/2/4`). Both directions are implemented so emitted text
//! and bytes re-parse to the same (normalized) IR.
//!
//! Integer pushes wider than 4 script-number bytes are rejected here --
//! folding is arbitrary-precision, the target dialect is not.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use txsc_core::opcode::Opcode;
use txsc_core::script::{scriptnum_encode, OpInstr, Script};

use crate::error::CodegenError;

/// Renders the canonical human-readable form.
pub fn emit_asm(script: &Script) -> Result<String, CodegenError> {
    check_int_ranges(script)?;
    let script = script.normalized();
    let mut tokens: Vec<String> = Vec::new();
    for instr in script.iter() {
        match instr {
            OpInstr::PushInt(n) => tokens.push(small_int_token(n)?),
            OpInstr::PushBytes(b) => push_data_tokens(b, &mut tokens),
            OpInstr::Op(op) => tokens.push(op.name().to_string()),
        }
    }
    Ok(tokens.join(" "))
}

/// Renders the canonical binary form.
pub fn encode_bytes(script: &Script) -> Result<Vec<u8>, CodegenError> {
    check_int_ranges(script)?;
    let script = script.normalized();
    let mut out = Vec::new();
    for instr in script.iter() {
        match instr {
            OpInstr::PushInt(n) => {
                let v = n.to_i64().ok_or_else(|| invalid_push(n))?;
                match v {
                    0 => out.push(0x00),
                    -1 => out.push(0x4f),
                    1..=16 => out.push(0x50 + v as u8),
                    _ => return Err(invalid_push(n)),
                }
            }
            OpInstr::PushBytes(b) => {
                match b.len() {
                    0..=75 => out.push(b.len() as u8),
                    76..=0xff => {
                        out.push(0x4c);
                        out.push(b.len() as u8);
                    }
                    0x100..=0xffff => {
                        out.push(0x4d);
                        out.extend_from_slice(&(b.len() as u16).to_le_bytes());
                    }
                    _ => {
                        out.push(0x4e);
                        out.extend_from_slice(&(b.len() as u32).to_le_bytes());
                    }
                }
                out.extend_from_slice(b);
            }
            OpInstr::Op(op) => out.push(op.to_byte()),
        }
    }
    Ok(out)
}

/// Renders the binary form as lowercase hex.
pub fn emit_hex(script: &Script) -> Result<String, CodegenError> {
    Ok(to_hex(&encode_bytes(script)?))
}

/// Parses the textual form back into (normalized) IR.
pub fn parse_asm(text: &str) -> Result<Script, CodegenError> {
    let mut instrs = Vec::new();
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "OP_0" {
            instrs.push(OpInstr::push_int(0));
        } else if token == "OP_1NEGATE" {
            instrs.push(OpInstr::push_int(-1));
        } else if matches!(token, "OP_PUSHDATA1" | "OP_PUSHDATA2" | "OP_PUSHDATA4") {
            let len_token = tokens.next().ok_or(CodegenError::TruncatedScript)?;
            let len = parse_len_token(len_token)?;
            let data = parse_data_token(&mut tokens, len)?;
            instrs.push(OpInstr::PushBytes(data));
        } else if let Some(len_token) = token.strip_prefix("0x") {
            let len = usize::from_str_radix(len_token, 16).map_err(|_| {
                CodegenError::UnknownToken {
                    token: token.to_string(),
                }
            })?;
            let data = parse_data_token(&mut tokens, len)?;
            instrs.push(OpInstr::PushBytes(data));
        } else if let Some(op) = Opcode::from_name(token) {
            instrs.push(OpInstr::Op(op));
        } else if let Some(n) = parse_op_n(token) {
            instrs.push(OpInstr::push_int(n));
        } else {
            return Err(CodegenError::UnknownToken {
                token: token.to_string(),
            });
        }
    }
    Ok(instrs.into_iter().collect())
}

/// Parses canonical bytes back into (normalized) IR.
pub fn decode_bytes(bytes: &[u8]) -> Result<Script, CodegenError> {
    let mut instrs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        let offset = i;
        i += 1;
        match byte {
            0x00 => instrs.push(OpInstr::push_int(0)),
            1..=75 => {
                let data = take(bytes, &mut i, byte as usize)?;
                instrs.push(OpInstr::PushBytes(data));
            }
            0x4c => {
                let len = take(bytes, &mut i, 1)?[0] as usize;
                let data = take(bytes, &mut i, len)?;
                instrs.push(OpInstr::PushBytes(data));
            }
            0x4d => {
                let len_bytes = take(bytes, &mut i, 2)?;
                let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let data = take(bytes, &mut i, len)?;
                instrs.push(OpInstr::PushBytes(data));
            }
            0x4e => {
                let len_bytes = take(bytes, &mut i, 4)?;
                let len =
                    u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                        as usize;
                let data = take(bytes, &mut i, len)?;
                instrs.push(OpInstr::PushBytes(data));
            }
            0x4f => instrs.push(OpInstr::push_int(-1)),
            0x51..=0x60 => instrs.push(OpInstr::push_int((byte - 0x50) as i64)),
            _ => match Opcode::from_byte(byte) {
                Some(op) => instrs.push(OpInstr::Op(op)),
                None => return Err(CodegenError::UnknownOpcode { byte, offset }),
            },
        }
    }
    Ok(instrs.into_iter().collect())
}

/// Parses a lowercase/uppercase hex script.
pub fn parse_hex(text: &str) -> Result<Script, CodegenError> {
    let bytes = from_hex(text).ok_or_else(|| CodegenError::UnknownToken {
        token: text.to_string(),
    })?;
    decode_bytes(&bytes)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_push(n: &BigInt) -> CodegenError {
    CodegenError::InvalidPush {
        reason: format!("integer {} exceeds the 4-byte script number range", n),
    }
}

/// Rejects integer pushes outside the dialect's 4-byte range before
/// normalization turns them into opaque byte pushes.
fn check_int_ranges(script: &Script) -> Result<(), CodegenError> {
    for instr in script.iter() {
        if let OpInstr::PushInt(n) = instr {
            if scriptnum_encode(n).len() > 4 {
                return Err(invalid_push(n));
            }
        }
    }
    Ok(())
}

fn small_int_token(n: &BigInt) -> Result<String, CodegenError> {
    let v = n.to_i64().ok_or_else(|| invalid_push(n))?;
    Ok(match v {
        -1 => "OP_1NEGATE".to_string(),
        0 => "OP_0".to_string(),
        1..=16 => format!("OP_{}", v),
        _ => return Err(invalid_push(n)),
    })
}

fn push_data_tokens(data: &[u8], tokens: &mut Vec<String>) {
    match data.len() {
        0..=75 => tokens.push(format!("0x{:02x}", data.len())),
        76..=0xff => {
            tokens.push("OP_PUSHDATA1".to_string());
            tokens.push(format!("0x{:02x}", data.len()));
        }
        0x100..=0xffff => {
            tokens.push("OP_PUSHDATA2".to_string());
            tokens.push(format!("0x{:04x}", data.len()));
        }
        _ => {
            tokens.push("OP_PUSHDATA4".to_string());
            tokens.push(format!("0x{:08x}", data.len()));
        }
    }
    tokens.push(to_hex(data));
}

fn parse_len_token(token: &str) -> Result<usize, CodegenError> {
    token
        .strip_prefix("0x")
        .and_then(|hex| usize::from_str_radix(hex, 16).ok())
        .ok_or_else(|| CodegenError::UnknownToken {
            token: token.to_string(),
        })
}

fn parse_data_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    len: usize,
) -> Result<Vec<u8>, CodegenError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let token = tokens.next().ok_or(CodegenError::TruncatedScript)?;
    let data = from_hex(token).ok_or_else(|| CodegenError::UnknownToken {
        token: token.to_string(),
    })?;
    if data.len() != len {
        return Err(CodegenError::UnknownToken {
            token: token.to_string(),
        });
    }
    Ok(data)
}

fn parse_op_n(token: &str) -> Option<i64> {
    let digits = token.strip_prefix("OP_")?;
    let n: i64 = digits.parse().ok()?;
    (1..=16).contains(&n).then_some(n)
}

fn take(bytes: &[u8], i: &mut usize, len: usize) -> Result<Vec<u8>, CodegenError> {
    if *i + len > bytes.len() {
        return Err(CodegenError::TruncatedScript);
    }
    let out = bytes[*i..*i + len].to_vec();
    *i += len;
    Ok(out)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(instrs: Vec<OpInstr>) -> Script {
        instrs.into_iter().collect()
    }

    #[test]
    fn empty_script_emits_empty_output() {
        let s = Script::new();
        assert_eq!(emit_asm(&s).unwrap(), "");
        assert_eq!(emit_hex(&s).unwrap(), "");
        assert!(parse_asm("").unwrap().is_empty());
    }

    #[test]
    fn p2pkh_textual_form() {
        let s = script(vec![
            OpInstr::Op(Opcode::Dup),
            OpInstr::Op(Opcode::Hash160),
            OpInstr::PushBytes(vec![0x10; 20]),
            OpInstr::Op(Opcode::EqualVerify),
            OpInstr::Op(Opcode::CheckSig),
        ]);
        assert_eq!(
            emit_asm(&s).unwrap(),
            "OP_DUP OP_HASH160 0x14 1010101010101010101010101010101010101010 \
             OP_EQUALVERIFY OP_CHECKSIG"
        );
    }

    #[test]
    fn p2pkh_binary_form() {
        let s = script(vec![
            OpInstr::Op(Opcode::Dup),
            OpInstr::Op(Opcode::Hash160),
            OpInstr::PushBytes(vec![0x10; 20]),
            OpInstr::Op(Opcode::EqualVerify),
            OpInstr::Op(Opcode::CheckSig),
        ]);
        let hex = emit_hex(&s).unwrap();
        assert_eq!(
            hex,
            "76a914101010101010101010101010101010101010101088ac"
        );
    }

    #[test]
    fn small_integers_use_op_n() {
        let s = script(vec![
            OpInstr::push_int(0),
            OpInstr::push_int(4),
            OpInstr::push_int(16),
            OpInstr::push_int(-1),
        ]);
        assert_eq!(emit_asm(&s).unwrap(), "OP_0 OP_4 OP_16 OP_1NEGATE");
        assert_eq!(encode_bytes(&s).unwrap(), vec![0x00, 0x54, 0x60, 0x4f]);
    }

    #[test]
    fn larger_integers_become_minimal_byte_pushes() {
        let s = script(vec![OpInstr::push_int(17), OpInstr::push_int(1000)]);
        assert_eq!(emit_asm(&s).unwrap(), "0x01 11 0x02 e803");
        assert_eq!(
            encode_bytes(&s).unwrap(),
            vec![0x01, 0x11, 0x02, 0xe8, 0x03]
        );
    }

    #[test]
    fn data_embedding_form() {
        let s = script(vec![
            OpInstr::Op(Opcode::Return),
            OpInstr::PushBytes(vec![0x11, 0x22]),
        ]);
        assert_eq!(emit_asm(&s).unwrap(), "OP_RETURN 0x02 1122");
        assert_eq!(emit_hex(&s).unwrap(), "6a021122");
    }

    #[test]
    fn pushdata1_tier() {
        let data = vec![0xab; 80];
        let s = script(vec![OpInstr::PushBytes(data.clone())]);
        let asm = emit_asm(&s).unwrap();
        assert!(asm.starts_with("OP_PUSHDATA1 0x50 "));
        let bytes = encode_bytes(&s).unwrap();
        assert_eq!(&bytes[..2], &[0x4c, 80]);

        assert_eq!(parse_asm(&asm).unwrap(), s.normalized());
        assert_eq!(decode_bytes(&bytes).unwrap(), s.normalized());
    }

    #[test]
    fn oversized_integer_push_is_rejected() {
        // 2^40 needs more than 4 script-number bytes.
        let s = script(vec![OpInstr::PushInt(BigInt::from(1u64 << 40))]);
        assert!(matches!(
            emit_asm(&s),
            Err(CodegenError::InvalidPush { .. })
        ));
        assert!(matches!(
            encode_bytes(&s),
            Err(CodegenError::InvalidPush { .. })
        ));
    }

    #[test]
    fn asm_roundtrip_equals_normalized_ir() {
        let s = script(vec![
            OpInstr::push_int(4),
            OpInstr::push_int(1000),
            OpInstr::PushBytes(vec![0xde, 0xad, 0xbe, 0xef]),
            OpInstr::Op(Opcode::If),
            OpInstr::Op(Opcode::Hash256),
            OpInstr::Op(Opcode::Else),
            OpInstr::Op(Opcode::Sha1),
            OpInstr::Op(Opcode::EndIf),
            OpInstr::Op(Opcode::CheckMultiSig),
        ]);
        let asm = emit_asm(&s).unwrap();
        assert_eq!(parse_asm(&asm).unwrap(), s.normalized());
    }

    #[test]
    fn binary_roundtrip_equals_normalized_ir() {
        let s = script(vec![
            OpInstr::push_int(0),
            OpInstr::push_int(-1),
            OpInstr::push_int(300),
            OpInstr::PushBytes(vec![0x01, 0x02, 0x03]),
            OpInstr::Op(Opcode::Within),
            OpInstr::Op(Opcode::Verify),
        ]);
        let bytes = encode_bytes(&s).unwrap();
        assert_eq!(decode_bytes(&bytes).unwrap(), s.normalized());
    }

    #[test]
    fn unknown_inputs_are_rejected() {
        assert!(matches!(
            parse_asm("OP_BOGUS"),
            Err(CodegenError::UnknownToken { .. })
        ));
        assert!(matches!(
            decode_bytes(&[0xfe]),
            Err(CodegenError::UnknownOpcode { byte: 0xfe, .. })
        ));
        assert!(matches!(
            decode_bytes(&[0x05, 0x01]),
            Err(CodegenError::TruncatedScript)
        ));
        assert!(matches!(
            parse_hex("0x"),
            Err(CodegenError::UnknownToken { .. })
        ));
    }

    #[test]
    fn parse_asm_validates_push_lengths() {
        assert!(matches!(
            parse_asm("0x02 11"),
            Err(CodegenError::UnknownToken { .. })
        ));
        assert_eq!(
            parse_asm("0x02 1122").unwrap(),
            script(vec![OpInstr::PushBytes(vec![0x11, 0x22])])
        );
    }
}
