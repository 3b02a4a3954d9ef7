// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from the analyzed tree to bytecode.
//!
//! The `Compiler` walks an analyzed, laid-out [`Program`] and emits one flat
//! instruction sequence. Functions and methods come first, each under its
//! `fn.name` (or `fn.Class.name`) label; the entry block follows under `main`,
//! so execution halts by running off the end.
//!
//! # Calling convention
//!
//! ```text
//! caller:                     callee:
//!   <receiver>  arg 4           frame N
//!   <arg 1>     arg size        <param n address>  param size  store size
//!   ...                         ...
//!   call fn.name                <receiver address> param 4     store 4
//!   param size  (if valued)     <body>
//!                             exit:
//!                               end
//!                               ret
//! ```
//!
//! `return e` evaluates `e`, moves it to the argument channel and jumps to the
//! exit label.

mod emitter;
mod expressions;
mod statements;


pub use emitter::Emitter;

use tracing::debug;

use crate::ast::*;
use crate::compiler::bytecode::{Bytecode, OpCode, Word, DEFAULT_ENTRY};
use crate::error::{Error, Result};
use crate::sema::{FuncId, Module, Type, VarId};

/// Compiles an analyzed program to bytecode.
pub struct Compiler<'m> {
    module: &'m Module,
    emitter: Emitter,
    function_labels: Vec<String>,
    exit_label: Option<String>,
}

impl<'m> Compiler<'m> {
    /// Creates a compiler over the laid-out `module`.
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            emitter: Emitter::new(),
            function_labels: function_labels(module),
            exit_label: None,
        }
    }

    /// Compiles `program`, consuming the compiler.
    pub fn compile(mut self, program: &Program) -> Result<Bytecode> {
        let main_frame = self
            .module
            .main_frame_size
            .ok_or_else(|| missing("entry frame size"))?;

        self.compile_functions(&program.body)?;

        self.emitter.bind(DEFAULT_ENTRY)?;
        self.emitter.set_depth(0);
        self.emitter.sized(OpCode::Frame, word(main_frame)?)?;
        self.compile_statements(&program.body)?;
        self.emitter.op(OpCode::End)?;

        let bytecode = self.emitter.finish(DEFAULT_ENTRY)?;
        debug!(
            instructions = bytecode.instructions.len(),
            labels = bytecode.labels.len(),
            "code generation complete"
        );
        Ok(bytecode)
    }

    /// Emits every function and method declared anywhere in `body`.
    fn compile_functions(&mut self, body: &[Statement]) -> Result<()> {
        for statement in body {
            match statement {
                Statement::FunctionDeclaration(func) => {
                    self.compile_function(func)?;
                    self.compile_functions(&func.body.body)?;
                }
                Statement::ClassDeclaration(class) => {
                    for method in &class.methods {
                        self.compile_function(method)?;
                        self.compile_functions(&method.body.body)?;
                    }
                }
                Statement::Block(block) => self.compile_functions(&block.body)?,
                Statement::If(stmt) => {
                    self.compile_functions(&stmt.consequent.body)?;
                    if let Some(alternate) = &stmt.alternate {
                        self.compile_functions(&alternate.body)?;
                    }
                }
                Statement::While(stmt) => self.compile_functions(&stmt.body.body)?,
                Statement::For(stmt) => {
                    self.compile_functions(&stmt.init)?;
                    self.compile_functions(&stmt.body.body)?;
                }
                Statement::VariableDeclaration(_)
                | Statement::Expression(_)
                | Statement::Print(_)
                | Statement::Return(_) => {}
            }
        }
        Ok(())
    }

    fn compile_function(&mut self, decl: &FunctionDeclaration) -> Result<()> {
        let id = decl
            .function
            .ok_or_else(|| missing(&format!("function '{}'", decl.name.name)))?;
        let module = self.module;
        let func = module.func(id);
        let frame = func
            .frame_size
            .ok_or_else(|| missing(&format!("frame size of '{}'", func.name)))?;

        let label = self.function_label(id)?.to_string();
        let exit = self.emitter.new_label();

        self.emitter.bind(&label)?;
        self.emitter.set_depth(0);
        self.emitter.sized(OpCode::Frame, word(frame)?)?;

        // Arguments arrive last-pushed-first.
        for param in func.params.iter().rev() {
            self.store_incoming(*param)?;
        }
        if let Some(receiver) = func.receiver {
            self.store_incoming(receiver)?;
        }

        let outer = self.exit_label.replace(exit.clone());
        self.compile_statements(&decl.body.body)?;
        self.exit_label = outer;

        self.emitter.bind(&exit)?;
        self.emitter.op(OpCode::End)?;
        self.emitter.op(OpCode::Ret)?;

        if self.emitter.depth() != 0 {
            return Err(Error::Internal(format!(
                "function '{}' leaves {} bytes on the stack",
                func.name,
                self.emitter.depth()
            )));
        }
        Ok(())
    }

    /// Moves one incoming argument from the channel into its slot.
    fn store_incoming(&mut self, var: VarId) -> Result<()> {
        let size = self.size_of(&self.module.var(var).ty)?;
        self.variable_address(var)?;
        self.emitter.sized(OpCode::Param, size)?;
        self.emitter.sized(OpCode::Store, size)?;
        Ok(())
    }

    fn function_label(&self, id: FuncId) -> Result<&str> {
        self.function_labels
            .get(id.0)
            .map(String::as_str)
            .ok_or_else(|| missing(&format!("label of function {}", id.0)))
    }

    /// Size of a type in bytes, as a word operand.
    fn size_of(&self, ty: &Type) -> Result<Word> {
        let size = self
            .module
            .size_of(ty)
            .ok_or_else(|| missing(&format!("size of '{}'", self.module.type_name(ty))))?;
        word(size)
    }

    /// Size of an expression's value; zero for procedure calls.
    fn value_size(&self, expr: &Expression) -> Result<Word> {
        match &expr.ty {
            Some(ty) => self.size_of(ty),
            None => Ok(0),
        }
    }
}

/// Labels for every function, `fn.name` or `fn.Class.name`. Names reused in
/// different scopes get the function's index appended.
fn function_labels(module: &Module) -> Vec<String> {
    let mut used = rustc_hash::FxHashSet::default();
    (0..module.function_count())
        .map(|index| {
            let func = module.func(FuncId(index));
            let base = match func.owner {
                Some(owner) => format!("fn.{}.{}", module.aggregate(owner).name, func.name),
                None => format!("fn.{}", func.name),
            };
            let label = if used.contains(&base) {
                format!("{}.{}", base, index)
            } else {
                base
            };
            used.insert(label.clone());
            label
        })
        .collect()
}

fn word(value: u32) -> Result<Word> {
    Word::try_from(value)
        .map_err(|_| Error::Internal(format!("{} does not fit in a word", value)))
}

fn missing(what: &str) -> Error {
    Error::Internal(format!("{} was not resolved before code generation", what))
}
