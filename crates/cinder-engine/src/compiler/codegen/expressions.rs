// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression compilation.
//!
//! | Expression | Emitted code |
//! |------------|--------------|
//! | constant | `push n` |
//! | entry-frame variable address | `push off` |
//! | local variable address | `push off; rx $fp; add` |
//! | `a[i]` address | `<i>; push size; mul; <base>; add` |
//! | `*p` address | `<p>` |
//! | `o.m` / `p->m` address | `<&o>` or `<p>`, then `push off; add` |
//! | lvalue value | `<address>; load size` |
//! | `a OP b` | `<a>; <b>; add/sub/mul/div` |
//! | `a CMP b` | `<a>; <b>; jINV else; push 1; jmp end; else: push 0; end:` |
//!
//! Array bases contribute their address, pointer bases their value.

use super::{missing, Compiler};
use crate::ast::*;
use crate::compiler::bytecode::{OpCode, Register, Word};
use crate::error::{Error, Result};
use crate::sema::{Storage, Type, VarId, WORD_SIZE};

impl<'m> Compiler<'m> {
    /// Emits code leaving the value of `expr` on the stack.
    pub(super) fn compile_value(&mut self, expr: &Expression) -> Result<()> {
        match &expr.kind {
            ExpressionKind::Constant(value) => {
                self.emitter.push(*value)?;
            }
            ExpressionKind::Identifier(_)
            | ExpressionKind::Index { .. }
            | ExpressionKind::Member { .. } => {
                let size = self.value_size(expr)?;
                self.compile_address(expr)?;
                self.emitter.sized(OpCode::Load, size)?;
            }
            ExpressionKind::Receiver(var) => {
                let var = var.ok_or_else(|| missing("'this'"))?;
                let size = self.value_size(expr)?;
                self.variable_address(var)?;
                self.emitter.sized(OpCode::Load, size)?;
            }
            ExpressionKind::Unary { operator, argument } => match operator {
                UnaryOperator::AddressOf => self.compile_address(argument)?,
                UnaryOperator::Plus => self.compile_value(argument)?,
                UnaryOperator::Minus => {
                    self.emitter.push(0)?;
                    self.compile_value(argument)?;
                    self.emitter.op(OpCode::Sub)?;
                }
                UnaryOperator::Deref => {
                    let size = self.value_size(expr)?;
                    self.compile_value(argument)?;
                    self.emitter.sized(OpCode::Load, size)?;
                }
            },
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => match operator {
                BinaryOperator::Assign => {
                    self.compile_assignment(left, right)?;
                    // The assignment's value is whatever now sits in the target.
                    let size = self.value_size(left)?;
                    self.compile_address(left)?;
                    self.emitter.sized(OpCode::Load, size)?;
                }
                op if op.is_comparison() => self.compile_comparison_value(expr)?,
                op => {
                    let opcode = arithmetic_opcode(*op)?;
                    self.compile_value(left)?;
                    self.compile_value(right)?;
                    self.emitter.op(opcode)?;
                }
            },
            ExpressionKind::Call(call) => self.compile_call(call, expr.ty.as_ref())?,
        }
        Ok(())
    }

    /// Emits code leaving the address of the lvalue `expr` on the stack.
    pub(super) fn compile_address(&mut self, expr: &Expression) -> Result<()> {
        match &expr.kind {
            ExpressionKind::Identifier(reference) => {
                let var = reference
                    .var
                    .ok_or_else(|| missing(&format!("name '{}'", reference.name)))?;
                self.variable_address(var)
            }
            ExpressionKind::Index { object, index } => {
                let element = self.value_size(expr)?;
                self.compile_value(index)?;
                self.emitter.push(element)?;
                self.emitter.op(OpCode::Mul)?;
                match &object.ty {
                    Some(Type::Array(..)) => self.compile_address(object)?,
                    Some(Type::Pointer(_)) => self.compile_value(object)?,
                    _ => return Err(missing("subscripted type")),
                }
                self.emitter.op(OpCode::Add)?;
                Ok(())
            }
            ExpressionKind::Unary {
                operator: UnaryOperator::Deref,
                argument,
            } => self.compile_value(argument),
            ExpressionKind::Member {
                object,
                property,
                indirect,
                member,
            } => {
                let member = member.ok_or_else(|| missing(&format!("member '{}'", property.name)))?;
                let offset = self
                    .module
                    .var(member)
                    .offset
                    .ok_or_else(|| missing(&format!("offset of member '{}'", property.name)))?;
                if *indirect {
                    self.compile_value(object)?;
                } else {
                    self.compile_address(object)?;
                }
                self.emitter.push(super::word(offset)?)?;
                self.emitter.op(OpCode::Add)?;
                Ok(())
            }
            _ => Err(Error::Internal(format!(
                "expression on line {} is not addressable",
                expr.line()
            ))),
        }
    }

    /// Emits the address of a declared variable.
    pub(super) fn variable_address(&mut self, var: VarId) -> Result<()> {
        let decl = self.module.var(var);
        let offset = decl
            .offset
            .ok_or_else(|| missing(&format!("offset of '{}'", decl.name)))?;
        let offset = super::word(offset)?;
        match decl.storage {
            Storage::Main => {
                self.emitter.push(offset)?;
            }
            Storage::Local => {
                self.emitter.push(offset)?;
                self.emitter.rx(Register::Fp)?;
                self.emitter.op(OpCode::Add)?;
            }
            Storage::Member(_) => {
                return Err(Error::Internal(format!(
                    "member '{}' addressed without an object",
                    decl.name
                )));
            }
        }
        Ok(())
    }

    /// Emits `target = value` leaving nothing on the stack.
    pub(super) fn compile_assignment(
        &mut self,
        target: &Expression,
        value: &Expression,
    ) -> Result<()> {
        let size = self.value_size(target)?;
        self.compile_address(target)?;
        self.compile_value(value)?;
        self.emitter.sized(OpCode::Store, size)?;
        Ok(())
    }

    /// Emits a call; a valued call leaves its result on the stack.
    fn compile_call(&mut self, call: &CallExpression, ty: Option<&Type>) -> Result<()> {
        let function = call
            .function
            .ok_or_else(|| missing(&format!("function '{}'", call.callee.name)))?;

        if let Some(receiver) = &call.receiver {
            let size = self.value_size(receiver)?;
            self.compile_value(receiver)?;
            self.emitter.sized(OpCode::Arg, size)?;
        }
        for argument in &call.arguments {
            let size = self.value_size(argument)?;
            self.compile_value(argument)?;
            self.emitter.sized(OpCode::Arg, size)?;
        }

        let label = self.function_label(function)?.to_string();
        self.emitter.jump(OpCode::Call, &label)?;

        if let Some(ty) = ty {
            let size = self.size_of(ty)?;
            self.emitter.sized(OpCode::Param, size)?;
        }
        Ok(())
    }

    /// Emits a test that jumps to `otherwise` when `test` is false.
    pub(super) fn compile_condition(&mut self, test: &Expression, otherwise: &str) -> Result<()> {
        match &test.kind {
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } if operator.is_comparison() => {
                self.compile_value(left)?;
                self.compile_value(right)?;
                self.emitter.jump(inverted_jump(*operator)?, otherwise)?;
            }
            _ => {
                self.compile_value(test)?;
                self.emitter.push(0)?;
                self.emitter.jump(OpCode::Jeq, otherwise)?;
            }
        }
        Ok(())
    }

    /// Materializes a comparison as 1 or 0.
    fn compile_comparison_value(&mut self, expr: &Expression) -> Result<()> {
        let otherwise = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.compile_condition(expr, &otherwise)?;
        let depth = self.emitter.depth();
        self.emitter.push(1)?;
        self.emitter.jump(OpCode::Jmp, &end)?;

        self.emitter.bind(&otherwise)?;
        self.emitter.set_depth(depth);
        self.emitter.push(0)?;
        self.emitter.bind(&end)?;
        Ok(())
    }

    /// Evaluates `expr` for its effects only.
    pub(super) fn compile_discarded(&mut self, expr: &Expression) -> Result<()> {
        if let ExpressionKind::Binary {
            operator: BinaryOperator::Assign,
            left,
            right,
        } = &expr.kind
        {
            return self.compile_assignment(left, right);
        }

        let size = self.value_size(expr)?;
        self.compile_value(expr)?;
        for _ in 0..size / WORD_SIZE as Word {
            self.emitter.op(OpCode::Pop)?;
        }
        Ok(())
    }
}

fn arithmetic_opcode(operator: BinaryOperator) -> Result<OpCode> {
    match operator {
        BinaryOperator::Add => Ok(OpCode::Add),
        BinaryOperator::Sub => Ok(OpCode::Sub),
        BinaryOperator::Mul => Ok(OpCode::Mul),
        BinaryOperator::Div => Ok(OpCode::Div),
        other => Err(Error::Internal(format!(
            "operator '{}' reached code generation",
            other.as_str()
        ))),
    }
}

/// The jump taken when `operator` does not hold.
fn inverted_jump(operator: BinaryOperator) -> Result<OpCode> {
    match operator {
        BinaryOperator::Gt => Ok(OpCode::Jle),
        BinaryOperator::Ge => Ok(OpCode::Jlt),
        BinaryOperator::Lt => Ok(OpCode::Jge),
        BinaryOperator::Le => Ok(OpCode::Jgt),
        BinaryOperator::Eq => Ok(OpCode::Jne),
        BinaryOperator::Ne => Ok(OpCode::Jeq),
        other => Err(Error::Internal(format!(
            "'{}' is not a comparison",
            other.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_jumps() {
        assert_eq!(inverted_jump(BinaryOperator::Gt).unwrap(), OpCode::Jle);
        assert_eq!(inverted_jump(BinaryOperator::Ge).unwrap(), OpCode::Jlt);
        assert_eq!(inverted_jump(BinaryOperator::Lt).unwrap(), OpCode::Jge);
        assert_eq!(inverted_jump(BinaryOperator::Le).unwrap(), OpCode::Jgt);
        assert_eq!(inverted_jump(BinaryOperator::Eq).unwrap(), OpCode::Jne);
        assert_eq!(inverted_jump(BinaryOperator::Ne).unwrap(), OpCode::Jeq);
        assert!(inverted_jump(BinaryOperator::Add).is_err());
    }

    #[test]
    fn test_compound_operators_never_reach_emission() {
        assert!(arithmetic_opcode(BinaryOperator::AddAssign).is_err());
        assert_eq!(arithmetic_opcode(BinaryOperator::Div).unwrap(), OpCode::Div);
    }
}
