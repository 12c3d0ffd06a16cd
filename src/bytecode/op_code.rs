use std::fmt;

use crate::syntax::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    OpConstant = 0,
    OpPop = 1,
    OpDup = 2,
    OpTrue = 3,
    OpFalse = 4,
    OpNull = 5,
    OpBinaryOp = 6,
    OpEqual = 7,
    OpNotEqual = 8,
    OpMinus = 9,
    OpLNot = 10,
    OpJump = 11,
    OpJumpFalsy = 12,
    OpAndJump = 13,
    OpOrJump = 14,
    OpSuspend = 15,
    OpGetGlobal = 16,
    OpSetGlobal = 17,
    OpGetLocal = 18,
    OpSetLocal = 19,
    OpDefineLocal = 20,
    OpGetFree = 21,
    OpSetFree = 22,
    OpGetLocalPtr = 23,
    OpGetFreePtr = 24,
    OpGetBuiltin = 25,
    OpArray = 26,
    OpMap = 27,
    OpIndex = 28,
    OpSliceIndex = 29,
    OpSetSelGlobal = 30,
    OpSetSelLocal = 31,
    OpSetSelFree = 32,
    OpClosure = 33,
    OpCall = 34,
    OpReturn = 35,
    OpImmutable = 36,
    OpIteratorInit = 37,
    OpIteratorNext = 38,
    OpIteratorKey = 39,
    OpIteratorValue = 40,
}

impl From<u8> for OpCode {
    fn from(byte: u8) -> Self {
        match byte {
            0 => OpCode::OpConstant,
            1 => OpCode::OpPop,
            2 => OpCode::OpDup,
            3 => OpCode::OpTrue,
            4 => OpCode::OpFalse,
            5 => OpCode::OpNull,
            6 => OpCode::OpBinaryOp,
            7 => OpCode::OpEqual,
            8 => OpCode::OpNotEqual,
            9 => OpCode::OpMinus,
            10 => OpCode::OpLNot,
            11 => OpCode::OpJump,
            12 => OpCode::OpJumpFalsy,
            13 => OpCode::OpAndJump,
            14 => OpCode::OpOrJump,
            15 => OpCode::OpSuspend,
            16 => OpCode::OpGetGlobal,
            17 => OpCode::OpSetGlobal,
            18 => OpCode::OpGetLocal,
            19 => OpCode::OpSetLocal,
            20 => OpCode::OpDefineLocal,
            21 => OpCode::OpGetFree,
            22 => OpCode::OpSetFree,
            23 => OpCode::OpGetLocalPtr,
            24 => OpCode::OpGetFreePtr,
            25 => OpCode::OpGetBuiltin,
            26 => OpCode::OpArray,
            27 => OpCode::OpMap,
            28 => OpCode::OpIndex,
            29 => OpCode::OpSliceIndex,
            30 => OpCode::OpSetSelGlobal,
            31 => OpCode::OpSetSelLocal,
            32 => OpCode::OpSetSelFree,
            33 => OpCode::OpClosure,
            34 => OpCode::OpCall,
            35 => OpCode::OpReturn,
            36 => OpCode::OpImmutable,
            37 => OpCode::OpIteratorInit,
            38 => OpCode::OpIteratorNext,
            39 => OpCode::OpIteratorKey,
            40 => OpCode::OpIteratorValue,
            _ => panic!("unknown opcode {}", byte),
        }
    }
}

impl OpCode {
    /// Short mnemonic used by the disassembler and the compiler trace.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::OpConstant => "CONST",
            OpCode::OpPop => "POP",
            OpCode::OpDup => "DUP",
            OpCode::OpTrue => "TRUE",
            OpCode::OpFalse => "FALSE",
            OpCode::OpNull => "NULL",
            OpCode::OpBinaryOp => "BINARYOP",
            OpCode::OpEqual => "EQL",
            OpCode::OpNotEqual => "NEQ",
            OpCode::OpMinus => "NEG",
            OpCode::OpLNot => "LNOT",
            OpCode::OpJump => "JMP",
            OpCode::OpJumpFalsy => "JMPF",
            OpCode::OpAndJump => "ANDJMP",
            OpCode::OpOrJump => "ORJMP",
            OpCode::OpSuspend => "SUSPEND",
            OpCode::OpGetGlobal => "GETG",
            OpCode::OpSetGlobal => "SETG",
            OpCode::OpGetLocal => "GETL",
            OpCode::OpSetLocal => "SETL",
            OpCode::OpDefineLocal => "DEFL",
            OpCode::OpGetFree => "GETF",
            OpCode::OpSetFree => "SETF",
            OpCode::OpGetLocalPtr => "GETLP",
            OpCode::OpGetFreePtr => "GETFP",
            OpCode::OpGetBuiltin => "GETB",
            OpCode::OpArray => "ARR",
            OpCode::OpMap => "MAP",
            OpCode::OpIndex => "IDX",
            OpCode::OpSliceIndex => "SLICE",
            OpCode::OpSetSelGlobal => "SETSELG",
            OpCode::OpSetSelLocal => "SETSELL",
            OpCode::OpSetSelFree => "SETSELF",
            OpCode::OpClosure => "CLOSURE",
            OpCode::OpCall => "CALL",
            OpCode::OpReturn => "RET",
            OpCode::OpImmutable => "IMMUT",
            OpCode::OpIteratorInit => "ITER",
            OpCode::OpIteratorNext => "ITNXT",
            OpCode::OpIteratorKey => "ITKEY",
            OpCode::OpIteratorValue => "ITVAL",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Byte widths of each opcode's operands, in order.
pub fn operand_widths(op: OpCode) -> &'static [usize] {
    match op {
        OpCode::OpConstant
        | OpCode::OpJump
        | OpCode::OpJumpFalsy
        | OpCode::OpAndJump
        | OpCode::OpOrJump
        | OpCode::OpGetGlobal
        | OpCode::OpSetGlobal
        | OpCode::OpArray
        | OpCode::OpMap => &[2],
        OpCode::OpBinaryOp
        | OpCode::OpGetLocal
        | OpCode::OpSetLocal
        | OpCode::OpDefineLocal
        | OpCode::OpGetFree
        | OpCode::OpSetFree
        | OpCode::OpGetLocalPtr
        | OpCode::OpGetFreePtr
        | OpCode::OpGetBuiltin
        | OpCode::OpReturn => &[1],
        OpCode::OpClosure | OpCode::OpSetSelGlobal => &[2, 1],
        OpCode::OpCall | OpCode::OpSetSelLocal | OpCode::OpSetSelFree => &[1, 1],
        _ => &[],
    }
}

pub type Instructions = Vec<u8>;

/// Assembles one instruction: opcode byte plus big-endian operands.
pub fn make(op: OpCode, operands: &[usize]) -> Instructions {
    let widths = operand_widths(op);
    let mut instruction = vec![op as u8];
    for (i, operand) in operands.iter().enumerate() {
        match widths.get(i).copied().unwrap_or(0) {
            1 => instruction.push(*operand as u8),
            2 => {
                instruction.push((*operand >> 8) as u8);
                instruction.push(*operand as u8);
            }
            _ => {}
        }
    }
    instruction
}

pub fn read_u16(instructions: &[u8], offset: usize) -> usize {
    ((instructions[offset] as usize) << 8) | (instructions[offset + 1] as usize)
}

pub fn read_u8(instructions: &[u8], offset: usize) -> usize {
    instructions[offset] as usize
}

/// Decodes the operands at `offset` (just past the opcode byte); returns the
/// operand values and the offset of the next instruction.
pub fn read_operands(op: OpCode, instructions: &[u8], offset: usize) -> (Vec<usize>, usize) {
    let mut operands = Vec::new();
    let mut offset = offset;
    for width in operand_widths(op) {
        match width {
            1 => {
                operands.push(read_u8(instructions, offset));
                offset += 1;
            }
            2 => {
                operands.push(read_u16(instructions, offset));
                offset += 2;
            }
            _ => {}
        }
    }
    (operands, offset)
}

/// Human-readable listing: one `offset mnemonic operands` line per
/// instruction. `BinaryOp` operands show the operator itself.
pub fn format_instructions(instructions: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut i = 0;
    while i < instructions.len() {
        let op = OpCode::from(instructions[i]);
        let (operands, next) = read_operands(op, instructions, i + 1);
        let operand_str = if op == OpCode::OpBinaryOp {
            match Token::from_op(operands[0] as u8) {
                Some(tok) => tok.to_string(),
                None => operands[0].to_string(),
            }
        } else {
            operands
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        if operand_str.is_empty() {
            lines.push(format!("{:04} {}", i, op));
        } else {
            lines.push(format!("{:04} {:<8} {}", i, op.mnemonic(), operand_str));
        }
        i = next;
    }
    lines
}
