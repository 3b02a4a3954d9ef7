// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Decoding bytecode into the interpreter's internal form.
//!
//! Loading checks every operand against its opcode once and replaces label
//! names with instruction indices, so the run loop never looks anything up.

use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand, Register, Word};
use crate::error::{Error, Result};
use crate::sema::WORD_SIZE;

/// Arithmetic on the top two words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

/// Conditions of the conditional jumps, tested as `a OP b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    Ne,
}

impl Condition {
    pub fn holds(self, a: Word, b: Word) -> bool {
        match self {
            Condition::Le => a <= b,
            Condition::Lt => a < b,
            Condition::Ge => a >= b,
            Condition::Gt => a > b,
            Condition::Eq => a == b,
            Condition::Ne => a != b,
        }
    }
}

/// A decoded instruction. Sizes are in words, targets are instruction indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Push(Word),
    Pop,
    Rx(Register),
    Arith(Arith),
    Branch(Condition, usize),
    Jump(usize),
    Load(usize),
    Store(usize),
    Frame(usize),
    End,
    Call(usize),
    Ret,
    Arg(usize),
    Param(usize),
    Print,
}

/// A program ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedProgram {
    pub ops: Vec<Op>,
    pub entry: usize,
}

/// Validates `bytecode` and resolves its labels, starting at `entry`.
pub fn load(bytecode: &Bytecode, entry: &str) -> Result<LoadedProgram> {
    bytecode.validate()?;

    let entry = *bytecode
        .labels
        .get(entry)
        .ok_or_else(|| Error::Load(format!("entry label '{}' is not defined", entry)))?;

    let ops = bytecode
        .instructions
        .iter()
        .enumerate()
        .map(|(index, instruction)| {
            decode(bytecode, instruction)
                .map_err(|message| Error::Load(format!("instruction {}: {}", index, message)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LoadedProgram { ops, entry })
}

fn decode(bytecode: &Bytecode, instruction: &Instruction) -> std::result::Result<Op, String> {
    let op = match instruction.opcode {
        OpCode::Push => Op::Push(int_operand(instruction)?),
        OpCode::Pop => Op::Pop,
        OpCode::Rx => match &instruction.operand {
            Some(Operand::Register(register)) => Op::Rx(*register),
            _ => return Err(format!("'{}' needs a register", instruction)),
        },
        OpCode::Add => Op::Arith(Arith::Add),
        OpCode::Sub => Op::Arith(Arith::Sub),
        OpCode::Mul => Op::Arith(Arith::Mul),
        OpCode::Div => Op::Arith(Arith::Div),
        OpCode::Jle => Op::Branch(Condition::Le, target(bytecode, instruction)?),
        OpCode::Jlt => Op::Branch(Condition::Lt, target(bytecode, instruction)?),
        OpCode::Jge => Op::Branch(Condition::Ge, target(bytecode, instruction)?),
        OpCode::Jgt => Op::Branch(Condition::Gt, target(bytecode, instruction)?),
        OpCode::Jeq => Op::Branch(Condition::Eq, target(bytecode, instruction)?),
        OpCode::Jne => Op::Branch(Condition::Ne, target(bytecode, instruction)?),
        OpCode::Jmp => Op::Jump(target(bytecode, instruction)?),
        OpCode::Load => Op::Load(words(instruction)?),
        OpCode::Store => Op::Store(words(instruction)?),
        OpCode::Frame => Op::Frame(bytes_to_words(int_operand(instruction)?, instruction)?),
        OpCode::End => Op::End,
        OpCode::Call => Op::Call(target(bytecode, instruction)?),
        OpCode::Ret => Op::Ret,
        OpCode::Arg => Op::Arg(words(instruction)?),
        OpCode::Param => Op::Param(words(instruction)?),
        OpCode::Print => Op::Print,
    };
    Ok(op)
}

fn int_operand(instruction: &Instruction) -> std::result::Result<Word, String> {
    match &instruction.operand {
        Some(Operand::Int(value)) => Ok(*value),
        _ => Err(format!("'{}' needs an integer", instruction)),
    }
}

fn target(bytecode: &Bytecode, instruction: &Instruction) -> std::result::Result<usize, String> {
    match &instruction.operand {
        Some(Operand::Label(label)) => bytecode
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| format!("undefined label '{}'", label)),
        _ => Err(format!("'{}' needs a label", instruction)),
    }
}

fn words(instruction: &Instruction) -> std::result::Result<usize, String> {
    let size = instruction
        .size()
        .ok_or_else(|| format!("'{}' has no size", instruction))?;
    bytes_to_words(size, instruction)
}

fn bytes_to_words(size: Word, instruction: &Instruction) -> std::result::Result<usize, String> {
    let word = WORD_SIZE as Word;
    if size < 0 || size % word != 0 {
        return Err(format!("'{}' is not a whole number of words", instruction));
    }
    Ok((size / word) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_labels() {
        let bytecode =
            Bytecode::parse("f:\n    ret\nmain:\n    frame 8\n    call f\n    jgt main\n    load 12\n")
                .unwrap();
        let program = load(&bytecode, "main").unwrap();
        assert_eq!(program.entry, 1);
        assert_eq!(
            program.ops,
            vec![
                Op::Ret,
                Op::Frame(2),
                Op::Call(0),
                Op::Branch(Condition::Gt, 1),
                Op::Load(3),
            ]
        );
    }

    #[test]
    fn test_missing_size_defaults_to_one_word() {
        let bytecode = Bytecode::parse("main:\n    store\n    arg\n").unwrap();
        let program = load(&bytecode, "main").unwrap();
        assert_eq!(program.ops, vec![Op::Store(1), Op::Arg(1)]);
    }

    #[test]
    fn test_load_rejects_unknown_entry() {
        let bytecode = Bytecode::parse("main:\n    pop\n").unwrap();
        assert!(matches!(load(&bytecode, "start"), Err(Error::Load(_))));
    }

    #[test]
    fn test_load_rejects_ragged_frame() {
        let bytecode = Bytecode::parse("main:\n    frame 6\n").unwrap();
        assert!(matches!(load(&bytecode, "main"), Err(Error::Load(_))));
    }

    #[test]
    fn test_load_rejects_bad_operand() {
        let mut bytecode = Bytecode::parse("main:\n    pop\n").unwrap();
        bytecode.instructions.push(Instruction::with_operand(
            OpCode::Push,
            Operand::Label("main".into()),
        ));
        assert!(matches!(load(&bytecode, "main"), Err(Error::Load(_))));
    }

    #[test]
    fn test_conditions() {
        assert!(Condition::Le.holds(2, 2));
        assert!(!Condition::Lt.holds(2, 2));
        assert!(Condition::Gt.holds(3, 2));
        assert!(Condition::Ne.holds(3, 2));
    }
}
