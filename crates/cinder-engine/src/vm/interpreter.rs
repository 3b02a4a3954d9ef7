// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode interpreter.

use tracing::{debug, trace};

use super::loader::{self, Arith, LoadedProgram, Op};
use crate::compiler::bytecode::{Bytecode, Register, Word};
use crate::config::VmConfig;
use crate::error::{Error, Result};
use crate::sema::WORD_SIZE;

const WORD: usize = WORD_SIZE as usize;

/// The virtual machine.
///
/// Memory is one value stack of 4-byte words addressed in bytes. Saved frame
/// pointers, return addresses and in-flight arguments each live on their own
/// stack, outside addressable memory.
#[derive(Clone)]
pub struct VM {
    config: VmConfig,
    bytecode: Option<Bytecode>,
    program: Option<LoadedProgram>,
    /// Value stack
    stack: Vec<Word>,
    /// Stack pointer, in bytes
    sp: usize,
    /// Frame pointer, in bytes
    fp: usize,
    /// Program counter
    pc: usize,
    /// Saved frame pointers
    frames: Vec<usize>,
    /// Return addresses
    calls: Vec<usize>,
    /// Argument channel, one group of words per `arg`
    arguments: Vec<Vec<Word>>,
    /// Values printed by the last run
    output: Vec<Word>,
}

impl VM {
    /// Creates a new VM.
    pub fn new(config: VmConfig) -> Self {
        Self {
            config,
            bytecode: None,
            program: None,
            stack: Vec::new(),
            sp: 0,
            fp: 0,
            pc: 0,
            frames: Vec::new(),
            calls: Vec::new(),
            arguments: Vec::new(),
            output: Vec::new(),
        }
    }

    /// The configuration this VM runs with.
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Validates `bytecode` and resolves its labels.
    pub fn load(&mut self, bytecode: &Bytecode) -> Result<()> {
        let entry = self.config.entry.as_deref().unwrap_or(&bytecode.entry);
        let program = loader::load(bytecode, entry)?;
        debug!(
            instructions = program.ops.len(),
            entry = program.entry,
            "bytecode loaded"
        );
        self.program = Some(program);
        self.bytecode = Some(bytecode.clone());
        Ok(())
    }

    /// Loads and runs `bytecode`, returning the printed values.
    pub fn execute(&mut self, bytecode: &Bytecode) -> Result<Vec<Word>> {
        self.load(bytecode)?;
        self.run()?;
        Ok(self.output.clone())
    }

    /// Runs the loaded program from its entry until it runs off the end.
    pub fn run(&mut self) -> Result<()> {
        let program = self
            .program
            .take()
            .ok_or_else(|| Error::Runtime("no program loaded".to_string()))?;
        let result = self.run_program(&program);
        self.program = Some(program);
        result
    }

    fn run_program(&mut self, program: &LoadedProgram) -> Result<()> {
        self.reset();
        self.pc = program.entry;

        while let Some(op) = program.ops.get(self.pc).copied() {
            trace!(pc = self.pc, sp = self.sp, fp = self.fp, ?op, "step");
            self.step(op)?;
        }

        debug!(
            printed = self.output.len(),
            sp = self.sp,
            frames = self.frames.len(),
            calls = self.calls.len(),
            "program halted"
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.stack.resize(self.config.stack_words, 0);
        self.sp = 0;
        self.fp = 0;
        self.pc = 0;
        self.frames.clear();
        self.calls.clear();
        self.arguments.clear();
        self.output.clear();
    }

    fn step(&mut self, op: Op) -> Result<()> {
        let mut next = self.pc + 1;

        match op {
            Op::Push(value) => self.push(value)?,
            Op::Pop => {
                self.pop()?;
            }
            Op::Rx(register) => {
                let value = match register {
                    Register::Fp => self.fp,
                    Register::Sp => self.sp,
                    Register::Pc => self.pc,
                };
                self.push(to_word(value)?)?;
            }
            Op::Arith(arith) => {
                let b = self.pop()?;
                let a = self.pop()?;
                let value = match arith {
                    Arith::Add => a.wrapping_add(b),
                    Arith::Sub => a.wrapping_sub(b),
                    Arith::Mul => a.wrapping_mul(b),
                    Arith::Div => {
                        if b == 0 {
                            return Err(self.fault("division by zero"));
                        }
                        a.wrapping_div(b)
                    }
                };
                self.push(value)?;
            }
            Op::Branch(condition, target) => {
                let b = self.pop()?;
                let a = self.pop()?;
                if condition.holds(a, b) {
                    next = target;
                }
            }
            Op::Jump(target) => next = target,
            Op::Load(words) => {
                let address = self.pop()?;
                let start = self.slot(address, words)?;
                for index in start..start + words {
                    let value = self.stack[index];
                    self.push(value)?;
                }
            }
            Op::Store(words) => {
                let values = self.pop_words(words)?;
                let address = self.pop()?;
                let start = self.slot(address, words)?;
                self.stack[start..start + words].copy_from_slice(&values);
            }
            Op::Frame(words) => {
                let base = self.sp / WORD;
                if base + words > self.stack.len() {
                    return Err(self.fault("stack overflow"));
                }
                self.frames.push(self.fp);
                self.fp = self.sp;
                self.stack[base..base + words].fill(0);
                self.sp += words * WORD;
            }
            Op::End => {
                let fp = self
                    .frames
                    .pop()
                    .ok_or_else(|| self.fault("frame stack is empty"))?;
                self.sp = self.fp;
                self.fp = fp;
            }
            Op::Call(target) => {
                self.calls.push(self.pc);
                next = target;
            }
            Op::Ret => {
                let caller = self
                    .calls
                    .pop()
                    .ok_or_else(|| self.fault("call stack is empty"))?;
                next = caller + 1;
            }
            Op::Arg(words) => {
                let values = self.pop_words(words)?;
                self.arguments.push(values);
            }
            Op::Param(words) => {
                let values = self
                    .arguments
                    .pop()
                    .ok_or_else(|| self.fault("argument channel is empty"))?;
                if values.len() != words {
                    return Err(self.fault(&format!(
                        "expected a {}-byte argument but {} bytes were passed",
                        words * WORD,
                        values.len() * WORD
                    )));
                }
                for value in values {
                    self.push(value)?;
                }
            }
            Op::Print => {
                let value = self.pop()?;
                if self.config.echo_prints {
                    eprintln!("> {}", value);
                }
                self.output.push(value);
            }
        }

        self.pc = next;
        Ok(())
    }

    fn push(&mut self, value: Word) -> Result<()> {
        let index = self.sp / WORD;
        if index >= self.stack.len() {
            return Err(self.fault("stack overflow"));
        }
        self.stack[index] = value;
        self.sp += WORD;
        Ok(())
    }

    fn pop(&mut self) -> Result<Word> {
        if self.sp < WORD {
            return Err(self.fault("stack underflow"));
        }
        self.sp -= WORD;
        Ok(self.stack[self.sp / WORD])
    }

    /// Pops `words` words, returned in stack order.
    fn pop_words(&mut self, words: usize) -> Result<Vec<Word>> {
        let mut values = (0..words)
            .map(|_| self.pop())
            .collect::<Result<Vec<_>>>()?;
        values.reverse();
        Ok(values)
    }

    /// Index of the first of `words` words at byte `address`.
    fn slot(&self, address: Word, words: usize) -> Result<usize> {
        let start = usize::try_from(address)
            .ok()
            .filter(|address| address % WORD == 0)
            .map(|address| address / WORD)
            .filter(|start| start + words <= self.stack.len())
            .ok_or_else(|| self.fault(&format!("address {} is out of range", address)))?;
        Ok(start)
    }

    fn fault(&self, message: &str) -> Error {
        Error::Runtime(format!("{} at instruction {}", message, self.pc))
    }

    /// Lists labels and instructions of the loaded program.
    pub fn dump(&self) -> String {
        self.bytecode
            .as_ref()
            .map(Bytecode::dump)
            .unwrap_or_default()
    }

    /// Values printed by the last run, in order.
    pub fn output(&self) -> &[Word] {
        &self.output
    }

    /// Current stack pointer, in bytes.
    pub fn stack_pointer(&self) -> usize {
        self.sp
    }

    /// Current frame pointer, in bytes.
    pub fn frame_pointer(&self) -> usize {
        self.fp
    }

    /// Number of saved frame pointers.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of pending return addresses.
    pub fn call_depth(&self) -> usize {
        self.calls.len()
    }

    /// Number of argument groups not yet taken by `param`.
    pub fn pending_arguments(&self) -> usize {
        self.arguments.len()
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

fn to_word(value: usize) -> Result<Word> {
    Word::try_from(value).map_err(|_| Error::Runtime(format!("{} does not fit in a word", value)))
}
