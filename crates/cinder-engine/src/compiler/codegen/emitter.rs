// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Instruction buffer with stack-depth accounting.
//!
//! Every emitted instruction adjusts `depth` by the number of bytes it leaves
//! on (or takes off) the value stack. Labels are symbolic names bound to the
//! next instruction index; [`Emitter::finish`] checks that every referenced
//! label was bound and produces the [`Bytecode`].

use rustc_hash::FxHashMap;

use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand, Register, Word};
use crate::error::{Error, Result};

/// Emission context for one program.
#[derive(Debug, Default)]
pub struct Emitter {
    instructions: Vec<Instruction>,
    labels: FxHashMap<String, usize>,
    depth: i64,
    next_label: usize,
}

impl Emitter {
    /// Creates an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of temporaries currently on the stack.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Resets the depth where control flow merges.
    pub fn set_depth(&mut self, depth: i64) {
        self.depth = depth;
    }

    /// Allocates a fresh local label.
    pub fn new_label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Binds `label` to the next instruction.
    pub fn bind(&mut self, label: &str) -> Result<()> {
        if self.labels.contains_key(label) {
            return Err(Error::Internal(format!("label '{}' bound twice", label)));
        }
        self.labels.insert(label.to_string(), self.instructions.len());
        Ok(())
    }

    /// Appends an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> Result<usize> {
        self.depth += stack_effect(&instruction)?;
        let index = self.instructions.len();
        self.instructions.push(instruction);
        Ok(index)
    }

    /// Emits an instruction without an operand.
    pub fn op(&mut self, opcode: OpCode) -> Result<usize> {
        self.emit(Instruction::simple(opcode))
    }

    /// Emits `push value`.
    pub fn push(&mut self, value: Word) -> Result<usize> {
        self.emit(Instruction::with_operand(OpCode::Push, Operand::Int(value)))
    }

    /// Emits `rx register`.
    pub fn rx(&mut self, register: Register) -> Result<usize> {
        self.emit(Instruction::with_operand(
            OpCode::Rx,
            Operand::Register(register),
        ))
    }

    /// Emits an instruction carrying a byte count.
    pub fn sized(&mut self, opcode: OpCode, size: Word) -> Result<usize> {
        self.emit(Instruction::with_operand(opcode, Operand::Int(size)))
    }

    /// Emits a jump or call to `label`.
    pub fn jump(&mut self, opcode: OpCode, label: &str) -> Result<usize> {
        self.emit(Instruction::with_operand(
            opcode,
            Operand::Label(label.to_string()),
        ))
    }

    /// Resolves labels and returns the finished program.
    pub fn finish(self, entry: &str) -> Result<Bytecode> {
        for (index, instruction) in self.instructions.iter().enumerate() {
            if let Some(Operand::Label(label)) = &instruction.operand {
                if !self.labels.contains_key(label) {
                    return Err(Error::Internal(format!(
                        "instruction {} jumps to unbound label '{}'",
                        index, label
                    )));
                }
            }
        }
        if !self.labels.contains_key(entry) {
            return Err(Error::Internal(format!("entry label '{}' was never bound", entry)));
        }

        Ok(Bytecode {
            instructions: self.instructions,
            labels: self.labels,
            entry: entry.to_string(),
        })
    }
}

/// Bytes an instruction adds to the value stack, negative when it removes them.
fn stack_effect(instruction: &Instruction) -> Result<i64> {
    let word = i64::from(crate::sema::WORD_SIZE);
    let size = || -> Result<i64> {
        instruction.size().map(i64::from).ok_or_else(|| {
            Error::Internal(format!("'{}' is missing its size", instruction))
        })
    };

    Ok(match instruction.opcode {
        OpCode::Push | OpCode::Rx => word,
        OpCode::Pop | OpCode::Print => -word,
        OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => -word,
        OpCode::Jle | OpCode::Jlt | OpCode::Jge | OpCode::Jgt | OpCode::Jeq | OpCode::Jne => {
            -2 * word
        }
        OpCode::Load => size()? - word,
        OpCode::Store => -(size()? + word),
        OpCode::Arg => -size()?,
        OpCode::Param => size()?,
        OpCode::Jmp | OpCode::Frame | OpCode::End | OpCode::Call | OpCode::Ret => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_accounting() {
        let mut emitter = Emitter::new();
        emitter.push(0).unwrap();
        emitter.rx(Register::Fp).unwrap();
        emitter.op(OpCode::Add).unwrap();
        assert_eq!(emitter.depth(), 4);
        emitter.sized(OpCode::Load, 12).unwrap();
        assert_eq!(emitter.depth(), 12);
        emitter.sized(OpCode::Arg, 12).unwrap();
        assert_eq!(emitter.depth(), 0);
        emitter.sized(OpCode::Param, 8).unwrap();
        emitter.push(1).unwrap();
        emitter.sized(OpCode::Store, 8).unwrap();
        assert_eq!(emitter.depth(), -4);
    }

    #[test]
    fn test_conditional_jump_pops_two_words() {
        let mut emitter = Emitter::new();
        let label = emitter.new_label();
        emitter.push(1).unwrap();
        emitter.push(2).unwrap();
        emitter.jump(OpCode::Jgt, &label).unwrap();
        emitter.bind(&label).unwrap();
        assert_eq!(emitter.depth(), 0);
    }

    #[test]
    fn test_labels_are_fresh() {
        let mut emitter = Emitter::new();
        assert_eq!(emitter.new_label(), "L0");
        assert_eq!(emitter.new_label(), "L1");
    }

    #[test]
    fn test_finish_resolves_labels() {
        let mut emitter = Emitter::new();
        emitter.bind("main").unwrap();
        let end = emitter.new_label();
        emitter.jump(OpCode::Jmp, &end).unwrap();
        emitter.push(1).unwrap();
        emitter.bind(&end).unwrap();
        let bytecode = emitter.finish("main").unwrap();
        assert_eq!(bytecode.labels["main"], 0);
        assert_eq!(bytecode.labels["L0"], 2);
        assert_eq!(bytecode.entry, "main");
    }

    #[test]
    fn test_finish_rejects_unbound_label() {
        let mut emitter = Emitter::new();
        emitter.bind("main").unwrap();
        emitter.jump(OpCode::Jmp, "nowhere").unwrap();
        assert!(matches!(emitter.finish("main"), Err(Error::Internal(_))));
    }

    #[test]
    fn test_double_bind_is_internal_error() {
        let mut emitter = Emitter::new();
        emitter.bind("main").unwrap();
        assert!(matches!(emitter.bind("main"), Err(Error::Internal(_))));
    }
}
