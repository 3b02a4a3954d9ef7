// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions.
//!
//! A program is a flat instruction list plus a label table mapping names to
//! instruction indices. Addresses are byte offsets into the VM's value stack;
//! every value is one or more 4-byte words.
//!
//! The textual listing form looks like:
//!
//! ```text
//! .entry main
//! fn.add:
//!     frame 8
//!     ...
//! main:
//!     frame 0
//!     push 3
//!     print
//!     end
//! ```

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// A machine word.
pub type Word = i32;

/// Label the VM starts from unless told otherwise.
pub const DEFAULT_ENTRY: &str = "main";

/// A compiled program.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// Label name to instruction index
    pub labels: FxHashMap<String, usize>,
    /// Label execution starts at
    pub entry: String,
}

impl Default for Bytecode {
    fn default() -> Self {
        Self::new()
    }
}

impl Bytecode {
    /// Creates a new empty program entered at `main`.
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            labels: FxHashMap::default(),
            entry: DEFAULT_ENTRY.to_string(),
        }
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Binds `name` to the next instruction index.
    pub fn add_label(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.labels.contains_key(&name) {
            return Err(Error::Load(format!("duplicate label '{}'", name)));
        }
        self.labels.insert(name, self.instructions.len());
        Ok(())
    }

    /// Labels sorted by position, then name.
    pub fn sorted_labels(&self) -> Vec<(&str, usize)> {
        let mut labels: Vec<(&str, usize)> = self
            .labels
            .iter()
            .map(|(name, index)| (name.as_str(), *index))
            .collect();
        labels.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        labels
    }

    /// Checks operands against their opcodes and that every label resolves.
    pub fn validate(&self) -> Result<()> {
        if !self.labels.contains_key(&self.entry) {
            return Err(Error::Load(format!(
                "entry label '{}' is not defined",
                self.entry
            )));
        }
        for (name, index) in &self.labels {
            if *index > self.instructions.len() {
                return Err(Error::Load(format!(
                    "label '{}' points past the end of the program",
                    name
                )));
            }
        }
        for (index, instruction) in self.instructions.iter().enumerate() {
            instruction
                .validate()
                .map_err(|message| Error::Load(format!("instruction {}: {}", index, message)))?;
            if let Some(Operand::Label(label)) = &instruction.operand {
                if !self.labels.contains_key(label) {
                    return Err(Error::Load(format!(
                        "instruction {}: undefined label '{}'",
                        index, label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Renders the label table followed by numbered instructions.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (name, index) in self.sorted_labels() {
            out.push_str(&format!("{}: {}\n", name, index));
        }
        for (index, instruction) in self.instructions.iter().enumerate() {
            out.push_str(&format!("{:>4} {}\n", index, instruction));
        }
        out
    }

    /// Parses a textual listing.
    pub fn parse(text: &str) -> Result<Self> {
        let mut bytecode = Bytecode::new();

        for (number, raw) in text.lines().enumerate() {
            let line_no = number + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(entry) = line.strip_prefix(".entry") {
                let entry = entry.trim();
                if entry.is_empty() {
                    return Err(Error::Load(format!("line {}: missing entry label", line_no)));
                }
                bytecode.entry = entry.to_string();
                continue;
            }

            if let Some(label) = line.strip_suffix(':') {
                if label.is_empty() || label.contains(char::is_whitespace) {
                    return Err(Error::Load(format!("line {}: invalid label '{}'", line_no, line)));
                }
                bytecode
                    .add_label(label)
                    .map_err(|err| Error::Load(format!("line {}: {}", line_no, load_message(err))))?;
                continue;
            }

            let instruction = Instruction::parse(line)
                .map_err(|message| Error::Load(format!("line {}: {}", line_no, message)))?;
            bytecode.emit(instruction);
        }

        Ok(bytecode)
    }
}

fn load_message(err: Error) -> String {
    match err {
        Error::Load(message) => message,
        other => other.to_string(),
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entry != DEFAULT_ENTRY {
            writeln!(f, ".entry {}", self.entry)?;
        }

        let labels = self.sorted_labels();
        let mut next = labels.iter().peekable();
        for (index, instruction) in self.instructions.iter().enumerate() {
            while let Some((name, _)) = next.next_if(|(_, at)| *at == index) {
                writeln!(f, "{}:", name)?;
            }
            writeln!(f, "    {}", instruction)?;
        }
        for (name, _) in next {
            writeln!(f, "{}:", name)?;
        }
        Ok(())
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }

    /// The size operand of `load`/`store`/`arg`/`param`, defaulting to one word.
    pub fn size(&self) -> Option<Word> {
        match (&self.opcode.operand_kind(), &self.operand) {
            (OperandKind::OptionalSize, Some(Operand::Int(size))) => Some(*size),
            (OperandKind::OptionalSize, None) => Some(crate::sema::WORD_SIZE as Word),
            _ => None,
        }
    }

    /// Checks that the operand fits the opcode.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let ok = match (self.opcode.operand_kind(), &self.operand) {
            (OperandKind::None, None) => true,
            (OperandKind::Int, Some(Operand::Int(_))) => true,
            (OperandKind::OptionalSize, None) => true,
            (OperandKind::OptionalSize, Some(Operand::Int(size))) => {
                *size >= 0 && *size % crate::sema::WORD_SIZE as Word == 0
            }
            (OperandKind::Register, Some(Operand::Register(_))) => true,
            (OperandKind::Label, Some(Operand::Label(_))) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("invalid operand for '{}': {}", self.opcode, self))
        }
    }

    /// Parses `mnemonic [operand]`.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut parts = line.split_whitespace();
        let mnemonic = parts.next().ok_or_else(|| "empty instruction".to_string())?;
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| format!("unknown opcode '{}'", mnemonic))?;
        let operand = parts.next();
        if let Some(extra) = parts.next() {
            return Err(format!("unexpected '{}' after '{}'", extra, mnemonic));
        }

        let operand = match (opcode.operand_kind(), operand) {
            (OperandKind::None, None) | (OperandKind::OptionalSize, None) => None,
            (OperandKind::Int | OperandKind::OptionalSize, Some(text)) => Some(Operand::Int(
                text.parse()
                    .map_err(|_| format!("'{}' expects an integer, found '{}'", mnemonic, text))?,
            )),
            (OperandKind::Register, Some(text)) => Some(Operand::Register(
                Register::from_name(text)
                    .ok_or_else(|| format!("unknown register '{}'", text))?,
            )),
            (OperandKind::Label, Some(text)) => Some(Operand::Label(text.to_string())),
            (OperandKind::None, Some(text)) => {
                return Err(format!("'{}' takes no operand, found '{}'", mnemonic, text));
            }
            (_, None) => return Err(format!("'{}' requires an operand", mnemonic)),
        };

        let instruction = Self { opcode, operand };
        instruction.validate()?;
        Ok(instruction)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Immediate value or byte count
    Int(Word),
    /// Register read by `rx`
    Register(Register),
    /// Jump or call target
    Label(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(value) => write!(f, "{}", value),
            Operand::Register(register) => write!(f, "{}", register),
            Operand::Label(label) => f.write_str(label),
        }
    }
}

/// Registers readable with `rx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Frame pointer
    Fp,
    /// Stack pointer
    Sp,
    /// Program counter
    Pc,
}

impl Register {
    /// Parses `$fp`, `$sp` or `$pc`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "$fp" => Some(Register::Fp),
            "$sp" => Some(Register::Sp),
            "$pc" => Some(Register::Pc),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Register::Fp => "$fp",
            Register::Sp => "$sp",
            Register::Pc => "$pc",
        })
    }
}

/// What operand an opcode takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand
    None,
    /// A required integer
    Int,
    /// An optional byte count, one word when omitted
    OptionalSize,
    /// A register
    Register,
    /// A label
    Label,
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push an immediate
    Push,
    /// Discard the top word
    Pop,
    /// Push the value of a register
    Rx,

    // Arithmetic operations
    /// Add top two words
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide, truncating
    Div,

    // Control flow; conditional jumps pop `b` then `a` and test `a OP b`
    /// Jump if less or equal
    Jle,
    /// Jump if less
    Jlt,
    /// Jump if greater or equal
    Jge,
    /// Jump if greater
    Jgt,
    /// Jump if equal
    Jeq,
    /// Jump if not equal
    Jne,
    /// Unconditional jump
    Jmp,

    // Memory operations
    /// Pop an address, push the value stored there
    Load,
    /// Pop a value then an address, store the value
    Store,

    // Frames and calls
    /// Save the frame pointer and reserve a frame
    Frame,
    /// Release the current frame
    End,
    /// Call a label
    Call,
    /// Return to the caller
    Ret,
    /// Move a value from the stack to the argument channel
    Arg,
    /// Move a value from the argument channel to the stack
    Param,

    // Special
    /// Pop and print the top word
    Print,
}

impl OpCode {
    /// Every opcode, in declaration order.
    pub const ALL: [OpCode; 23] = [
        OpCode::Push,
        OpCode::Pop,
        OpCode::Rx,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Jle,
        OpCode::Jlt,
        OpCode::Jge,
        OpCode::Jgt,
        OpCode::Jeq,
        OpCode::Jne,
        OpCode::Jmp,
        OpCode::Load,
        OpCode::Store,
        OpCode::Frame,
        OpCode::End,
        OpCode::Call,
        OpCode::Ret,
        OpCode::Arg,
        OpCode::Param,
        OpCode::Print,
    ];

    /// The listing name.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Push => "push",
            OpCode::Pop => "pop",
            OpCode::Rx => "rx",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Jle => "jle",
            OpCode::Jlt => "jlt",
            OpCode::Jge => "jge",
            OpCode::Jgt => "jgt",
            OpCode::Jeq => "jeq",
            OpCode::Jne => "jne",
            OpCode::Jmp => "jmp",
            OpCode::Load => "load",
            OpCode::Store => "store",
            OpCode::Frame => "frame",
            OpCode::End => "end",
            OpCode::Call => "call",
            OpCode::Ret => "ret",
            OpCode::Arg => "arg",
            OpCode::Param => "param",
            OpCode::Print => "print",
        }
    }

    /// Looks up an opcode by its listing name.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }

    /// What operand this opcode takes.
    pub fn operand_kind(self) -> OperandKind {
        match self {
            OpCode::Push | OpCode::Frame => OperandKind::Int,
            OpCode::Load | OpCode::Store | OpCode::Arg | OpCode::Param => {
                OperandKind::OptionalSize
            }
            OpCode::Rx => OperandKind::Register,
            OpCode::Jle
            | OpCode::Jlt
            | OpCode::Jge
            | OpCode::Jgt
            | OpCode::Jeq
            | OpCode::Jne
            | OpCode::Jmp
            | OpCode::Call => OperandKind::Label,
            OpCode::Pop
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::End
            | OpCode::Ret
            | OpCode::Print => OperandKind::None,
        }
    }

    /// Returns true for the six conditional jumps.
    pub fn is_conditional_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jle | OpCode::Jlt | OpCode::Jge | OpCode::Jgt | OpCode::Jeq | OpCode::Jne
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
