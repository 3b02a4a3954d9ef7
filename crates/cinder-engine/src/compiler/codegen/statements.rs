// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Statement compilation.
//!
//! Every statement leaves the stack depth where it found it; the compiler
//! checks this after each one and reports a difference as an internal error.
//! Declarations emit nothing here: storage is reserved by `frame`, and
//! functions are emitted separately.
//!
//! ## Control Flow Compilation
//!
//! ### If Statement
//!
//! ```text
//!   <test>  jINV else
//!   <then>
//!   jmp end
//! else:
//!   <else>
//! end:
//! ```
//!
//! ### While / For
//!
//! ```text
//!   <init>            (for only)
//! start:
//!   <test>  jINV end
//!   <body>
//!   <update>          (for only)
//!   jmp start
//! end:
//! ```

use super::{missing, Compiler};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::error::{Error, Result};

impl<'m> Compiler<'m> {
    pub(super) fn compile_statements(&mut self, body: &[Statement]) -> Result<()> {
        for statement in body {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<()> {
        let depth = self.emitter.depth();

        match statement {
            Statement::VariableDeclaration(_)
            | Statement::FunctionDeclaration(_)
            | Statement::ClassDeclaration(_) => {}
            Statement::Expression(stmt) => self.compile_discarded(&stmt.expression)?,
            Statement::Block(block) => self.compile_statements(&block.body)?,
            Statement::Print(stmt) => {
                self.compile_value(&stmt.argument)?;
                self.emitter.op(OpCode::Print)?;
            }
            Statement::Return(stmt) => self.compile_return(stmt)?,
            Statement::If(stmt) => self.compile_if(stmt)?,
            Statement::While(stmt) => {
                let start = self.emitter.new_label();
                let end = self.emitter.new_label();
                self.emitter.bind(&start)?;
                self.compile_condition(&stmt.test, &end)?;
                self.compile_statements(&stmt.body.body)?;
                self.emitter.jump(OpCode::Jmp, &start)?;
                self.emitter.bind(&end)?;
            }
            Statement::For(stmt) => {
                self.compile_statements(&stmt.init)?;
                let start = self.emitter.new_label();
                let end = self.emitter.new_label();
                self.emitter.bind(&start)?;
                self.compile_condition(&stmt.test, &end)?;
                self.compile_statements(&stmt.body.body)?;
                if let Some(update) = &stmt.update {
                    self.compile_discarded(update)?;
                }
                self.emitter.jump(OpCode::Jmp, &start)?;
                self.emitter.bind(&end)?;
            }
        }

        if self.emitter.depth() != depth {
            return Err(Error::Internal(format!(
                "statement changed the stack depth from {} to {}",
                depth,
                self.emitter.depth()
            )));
        }
        Ok(())
    }

    fn compile_if(&mut self, stmt: &IfStatement) -> Result<()> {
        let otherwise = self.emitter.new_label();
        self.compile_condition(&stmt.test, &otherwise)?;
        self.compile_statements(&stmt.consequent.body)?;

        match &stmt.alternate {
            Some(alternate) => {
                let end = self.emitter.new_label();
                self.emitter.jump(OpCode::Jmp, &end)?;
                self.emitter.bind(&otherwise)?;
                self.compile_statements(&alternate.body)?;
                self.emitter.bind(&end)?;
            }
            None => self.emitter.bind(&otherwise)?,
        }
        Ok(())
    }

    fn compile_return(&mut self, stmt: &ReturnStatement) -> Result<()> {
        let exit = self
            .exit_label
            .clone()
            .ok_or_else(|| missing("enclosing function of 'return'"))?;
        if let Some(argument) = &stmt.argument {
            let size = self.value_size(argument)?;
            self.compile_value(argument)?;
            self.emitter.sized(OpCode::Arg, size)?;
        }
        self.emitter.jump(OpCode::Jmp, &exit)?;
        Ok(())
    }
}
