// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler for Cinder.
//!
//! Transforms the analyzed, laid-out tree into bytecode for the VM.
//!
//! # Module Structure
//!
//! - `bytecode`: instruction set, label table and textual listings
//! - `codegen`: code generation from the tree
//!   - `codegen::emitter`: instruction buffer with stack-depth accounting

pub mod bytecode;
pub mod codegen;

pub use bytecode::{Bytecode, Instruction, OpCode, Operand, OperandKind, Register, Word};
pub use codegen::{Compiler, Emitter};
