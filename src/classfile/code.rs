//! Minimal bytecode walker over a `Code` attribute payload.
//!
//! The rewriter never interprets bytecode semantics. All it needs from a
//! method body is the set of constant-pool operand sites - where an
//! instruction embeds a pool index - so the recount pass can tally references,
//! the trimming scan can record what a body reaches, and the reflective-string
//! stage can find `ldc` sites to patch. A table of per-opcode instruction
//! lengths drives the walk; the three variable-length shapes (`tableswitch`,
//! `lookupswitch`, `wide`) are handled explicitly.
//!
//! # Key Components
//!
//! - [`crate::classfile::code::CodeAttribute`] - the decoded `Code` payload:
//!   stack/locals sizes, the bytecode array, the exception table, and the
//!   nested attribute list
//! - [`crate::classfile::code::PoolSite`] - one pool-index operand site
//! - [`crate::classfile::code::pool_sites`] - the reference scan itself
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::classfile::code::pool_sites;
//!
//! // ldc #7; invokestatic #8; return
//! let code = [0x12, 0x07, 0xB8, 0x00, 0x08, 0xB1];
//! let sites = pool_sites(&code)?;
//! assert_eq!(sites.len(), 2);
//! assert_eq!((sites[0].opcode, sites[0].index), (0x12, 7));
//! assert_eq!((sites[1].opcode, sites[1].index), (0xB8, 8));
//! # Ok::<(), classcloak::Error>(())
//! ```

use crate::{
    classfile::attributes::{self, AttributeInfo},
    file::{push_be, read_be_at},
    Parser, Result,
};

/// Opcodes that embed a one-byte pool index (`ldc`).
pub const OP_LDC: u8 = 0x12;
/// `ldc_w` - two-byte pool index, loadable constant.
pub const OP_LDC_W: u8 = 0x13;
/// `ldc2_w` - two-byte pool index, two-slot constant.
pub const OP_LDC2_W: u8 = 0x14;
/// `invokestatic` - the opcode the reflective-string scan pairs with `ldc`.
pub const OP_INVOKESTATIC: u8 = 0xB8;

/// Per-opcode total instruction lengths (opcode byte included).
///
/// Zero marks the variable-length shapes handled out of line: `tableswitch`
/// (0xAA), `lookupswitch` (0xAB) and `wide` (0xC4). Opcodes past 0xC9 do not
/// occur in well-formed code arrays and also read as zero, which the walker
/// reports as corrupt.
const OPCODE_LENGTHS: [u8; 256] = build_opcode_lengths();

const fn build_opcode_lengths() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    // Most of the instruction set is single-byte.
    while i <= 0xC9 {
        table[i] = 1;
        i += 1;
    }
    // opcode + one operand byte
    table[0x10] = 2; // bipush
    table[0x12] = 2; // ldc
    table[0x15] = 2; // iload
    table[0x16] = 2; // lload
    table[0x17] = 2; // fload
    table[0x18] = 2; // dload
    table[0x19] = 2; // aload
    table[0x36] = 2; // istore
    table[0x37] = 2; // lstore
    table[0x38] = 2; // fstore
    table[0x39] = 2; // dstore
    table[0x3A] = 2; // astore
    table[0xBC] = 2; // newarray
    // opcode + two operand bytes
    table[0x11] = 3; // sipush
    table[0x13] = 3; // ldc_w
    table[0x14] = 3; // ldc2_w
    table[0x84] = 3; // iinc
    let mut branch = 0x99; // ifeq .. jsr (0x99..=0xA8)
    while branch <= 0xA8 {
        table[branch] = 3;
        branch += 1;
    }
    table[0xB2] = 3; // getstatic
    table[0xB3] = 3; // putstatic
    table[0xB4] = 3; // getfield
    table[0xB5] = 3; // putfield
    table[0xB6] = 3; // invokevirtual
    table[0xB7] = 3; // invokespecial
    table[0xB8] = 3; // invokestatic
    table[0xBB] = 3; // new
    table[0xBD] = 3; // anewarray
    table[0xC0] = 3; // checkcast
    table[0xC1] = 3; // instanceof
    table[0xC6] = 3; // ifnull
    table[0xC7] = 3; // ifnonnull
    // opcode + four operand bytes
    table[0xC5] = 4; // multianewarray (u16 index + u8 dims)
    table[0xB9] = 5; // invokeinterface (u16 index + count + 0)
    table[0xBA] = 5; // invokedynamic (u16 index + 0 + 0)
    table[0xC8] = 5; // goto_w
    table[0xC9] = 5; // jsr_w
    // variable-length shapes
    table[0xAA] = 0; // tableswitch
    table[0xAB] = 0; // lookupswitch
    table[0xC4] = 0; // wide
    table
}

/// One constant-pool operand site inside a bytecode array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSite {
    /// Byte offset of the *instruction* within the code array.
    pub offset: usize,
    /// The opcode at that offset.
    pub opcode: u8,
    /// The pool index the operand currently holds.
    pub index: u16,
    /// `true` when the operand is two bytes wide (everything except `ldc`).
    pub wide_operand: bool,
}

/// Scan a bytecode array and yield every constant-pool operand site in order.
///
/// # Errors
/// Fails with [`crate::Error::CorruptFormat`] if an instruction overruns the
/// code array or an undefined opcode is encountered.
pub fn pool_sites(code: &[u8]) -> Result<Vec<PoolSite>> {
    let mut sites = Vec::new();
    let mut pc = 0usize;

    while pc < code.len() {
        let opcode = code[pc];
        match opcode {
            OP_LDC => {
                let index = *code.get(pc + 1).ok_or_else(|| {
                    corrupt_format!("truncated ldc at code offset {}", pc)
                })?;
                sites.push(PoolSite {
                    offset: pc,
                    opcode,
                    index: u16::from(index),
                    wide_operand: false,
                });
                pc += 2;
            }
            OP_LDC_W | OP_LDC2_W | 0xB2..=0xB8 | 0xBB | 0xBD | 0xC0 | 0xC1 => {
                sites.push(operand_site(code, pc, opcode)?);
                pc += 3;
            }
            0xB9 | 0xBA => {
                sites.push(operand_site(code, pc, opcode)?);
                pc += 5;
            }
            0xC5 => {
                sites.push(operand_site(code, pc, opcode)?);
                pc += 4;
            }
            0xAA => pc = skip_tableswitch(code, pc)?,
            0xAB => pc = skip_lookupswitch(code, pc)?,
            0xC4 => pc = skip_wide(code, pc)?,
            _ => {
                let len = OPCODE_LENGTHS[usize::from(opcode)];
                if len == 0 {
                    return Err(corrupt_format!(
                        "undefined opcode 0x{:02X} at code offset {}",
                        opcode,
                        pc
                    ));
                }
                pc += usize::from(len);
            }
        }
        if pc > code.len() {
            return Err(corrupt_format!(
                "instruction 0x{:02X} overruns the code array",
                opcode
            ));
        }
    }

    Ok(sites)
}

fn operand_site(code: &[u8], pc: usize, opcode: u8) -> Result<PoolSite> {
    let mut at = pc + 1;
    let index = read_be_at::<u16>(code, &mut at)
        .map_err(|_| corrupt_format!("truncated instruction 0x{:02X} at offset {}", opcode, pc))?;
    Ok(PoolSite {
        offset: pc,
        opcode,
        index,
        wide_operand: true,
    })
}

fn skip_tableswitch(code: &[u8], pc: usize) -> Result<usize> {
    let mut at = pad_to_four(pc + 1);
    let _default = read_switch_i32(code, &mut at)?;
    let low = read_switch_i32(code, &mut at)?;
    let high = read_switch_i32(code, &mut at)?;
    if high < low {
        return Err(corrupt_format!("tableswitch with high < low at offset {}", pc));
    }
    let entries = (i64::from(high) - i64::from(low) + 1) as usize;
    let Some(end) = at.checked_add(entries * 4) else {
        return Err(corrupt_format!("tableswitch overruns the code array"));
    };
    if end > code.len() {
        return Err(corrupt_format!("tableswitch overruns the code array"));
    }
    Ok(end)
}

fn skip_lookupswitch(code: &[u8], pc: usize) -> Result<usize> {
    let mut at = pad_to_four(pc + 1);
    let _default = read_switch_i32(code, &mut at)?;
    let npairs = read_switch_i32(code, &mut at)?;
    if npairs < 0 {
        return Err(corrupt_format!("lookupswitch with negative pair count"));
    }
    let Some(end) = at.checked_add(npairs as usize * 8) else {
        return Err(corrupt_format!("lookupswitch overruns the code array"));
    };
    if end > code.len() {
        return Err(corrupt_format!("lookupswitch overruns the code array"));
    }
    Ok(end)
}

fn skip_wide(code: &[u8], pc: usize) -> Result<usize> {
    match code.get(pc + 1) {
        Some(0x84) => Ok(pc + 6), // wide iinc
        Some(_) => Ok(pc + 4),    // wide load/store/ret
        None => Err(corrupt_format!("truncated wide instruction at offset {}", pc)),
    }
}

fn pad_to_four(at: usize) -> usize {
    (at + 3) & !3
}

fn read_switch_i32(code: &[u8], at: &mut usize) -> Result<i32> {
    read_be_at::<i32>(code, at).map_err(|_| corrupt_format!("truncated switch instruction"))
}

/// An exception-table entry of a `Code` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    /// Start of the protected range (inclusive code offset).
    pub start_pc: u16,
    /// End of the protected range (exclusive code offset).
    pub end_pc: u16,
    /// Handler entry point.
    pub handler_pc: u16,
    /// `Class` pool index of the caught type, or 0 for catch-all.
    pub catch_type: u16,
}

/// The decoded payload of a `Code` attribute.
///
/// Decoding is lossless: [`CodeAttribute::encode`] reproduces the input bytes
/// for an unmodified value. The bytecode array stays raw - only
/// [`pool_sites`] interprets it, and only shallowly.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    /// Operand-stack depth the method needs.
    pub max_stack: u16,
    /// Local-variable slot count the method needs.
    pub max_locals: u16,
    /// The raw bytecode array.
    pub code: Vec<u8>,
    /// The exception handler table.
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Attributes nested inside the `Code` attribute.
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    /// Decode a `Code` attribute payload.
    ///
    /// # Errors
    /// Fails with [`crate::Error::OutOfBounds`] on a short payload.
    pub fn decode(data: &[u8]) -> Result<CodeAttribute> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()?;
        let code = parser.read_bytes(code_length as usize)?.to_vec();

        let handler_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(usize::from(handler_count));
        for _ in 0..handler_count {
            exception_table.push(ExceptionTableEntry {
                start_pc: parser.read_be::<u16>()?,
                end_pc: parser.read_be::<u16>()?,
                handler_pc: parser.read_be::<u16>()?,
                catch_type: parser.read_be::<u16>()?,
            });
        }
        let attributes = attributes::decode_list(&mut parser)?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Re-encode the payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut sink = Vec::with_capacity(12 + self.code.len());
        push_be(&mut sink, self.max_stack);
        push_be(&mut sink, self.max_locals);
        push_be(&mut sink, self.code.len() as u32);
        sink.extend_from_slice(&self.code);
        push_be(&mut sink, self.exception_table.len() as u16);
        for entry in &self.exception_table {
            push_be(&mut sink, entry.start_pc);
            push_be(&mut sink, entry.end_pc);
            push_be(&mut sink, entry.handler_pc);
            push_be(&mut sink, entry.catch_type);
        }
        attributes::encode_list(&self.attributes, &mut sink);
        sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_member_and_type_operands() {
        // getfield #2; invokevirtual #3; new #4; dup; areturn
        let code = [0xB4, 0x00, 0x02, 0xB6, 0x00, 0x03, 0xBB, 0x00, 0x04, 0x59, 0xB0];
        let sites = pool_sites(&code).unwrap();
        let indices: Vec<u16> = sites.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 3, 4]);
        assert!(sites.iter().all(|s| s.wide_operand));
    }

    #[test]
    fn ldc_is_a_narrow_operand() {
        let code = [0x12, 0x09, 0xB1];
        let sites = pool_sites(&code).unwrap();
        assert_eq!(sites, vec![PoolSite { offset: 0, opcode: OP_LDC, index: 9, wide_operand: false }]);
    }

    #[test]
    fn skips_switches_and_wide() {
        // iconst_0; tableswitch (padded to offset 4): default, low=0, high=1, two entries;
        let mut code = vec![0x03, 0xAA, 0x00, 0x00];
        code.extend_from_slice(&0i32.to_be_bytes()); // default
        code.extend_from_slice(&0i32.to_be_bytes()); // low
        code.extend_from_slice(&1i32.to_be_bytes()); // high
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        // wide iload 256; getstatic #5; return
        code.extend_from_slice(&[0xC4, 0x15, 0x01, 0x00]);
        code.extend_from_slice(&[0xB2, 0x00, 0x05, 0xB1]);

        let sites = pool_sites(&code).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].index, 5);
    }

    #[test]
    fn truncated_instruction_is_corrupt() {
        assert!(pool_sites(&[0xB6, 0x00]).is_err());
        assert!(pool_sites(&[0x12]).is_err());
        assert!(pool_sites(&[0x10]).is_err(), "bipush missing its operand");
    }

    #[test]
    fn code_attribute_round_trip() {
        let attr = CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            code: vec![0x2A, 0xB7, 0x00, 0x06, 0xB1],
            exception_table: vec![ExceptionTableEntry {
                start_pc: 0,
                end_pc: 4,
                handler_pc: 4,
                catch_type: 7,
            }],
            attributes: vec![],
        };
        let bytes = attr.encode();
        assert_eq!(CodeAttribute::decode(&bytes).unwrap(), attr);
    }
}
