// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Name resolution, type checking and desugaring.
//!
//! The analyzer consumes an unannotated [`Program`] and returns it with every
//! arena slot and expression type filled in, together with the [`Module`]
//! holding the scope tree. It stops at the first error.
//!
//! Rewrites performed on the way:
//!
//! - `T x = e;` becomes `T x;` followed by the statement `x = e;`
//! - `a OP= b` becomes `a = a OP b`
//! - a bare member name inside a method becomes `this->name`
//! - `obj.m()` passes `&obj` as the receiver, bare `m()` passes `this`
//! - array arguments decay to `&a[0]`, array members to `&obj.member`

use tracing::debug;

use super::scope::{
    AggregateDecl, Binding, FuncDecl, Module, Scope, ScopeKind, Storage, VarDecl,
};
use super::types::{AggregateId, FuncId, ScopeId, Type, VarId};
use crate::ast::*;
use crate::error::{Location, SemanticError, SemanticErrorKind};
use crate::lexer::Span;

type Result<T> = std::result::Result<T, SemanticError>;

/// Resolves and type checks a program.
pub struct Analyzer {
    unit: String,
    module: Module,
    scope: ScopeId,
}

impl Analyzer {
    /// Creates an analyzer whose diagnostics name `unit` as the source.
    pub fn new(unit: impl Into<String>) -> Self {
        let module = Module::new();
        let scope = module.root();
        Self {
            unit: unit.into(),
            module,
            scope,
        }
    }

    /// Analyzes a whole program.
    pub fn analyze(mut self, mut program: Program) -> Result<(Program, Module)> {
        let body = std::mem::take(&mut program.body);
        program.body = self.analyze_statements(body)?;
        program.scope = Some(self.module.root());

        debug!(
            unit = %self.unit,
            functions = self.module.function_count(),
            aggregates = self.module.aggregate_count(),
            "analysis complete"
        );
        Ok((program, self.module))
    }

    // ==================== Statements ====================

    fn analyze_statements(&mut self, body: Vec<Statement>) -> Result<Vec<Statement>> {
        let mut out = Vec::with_capacity(body.len());
        for statement in body {
            self.analyze_statement(statement, &mut out)?;
        }
        Ok(out)
    }

    fn analyze_statement(&mut self, statement: Statement, out: &mut Vec<Statement>) -> Result<()> {
        match statement {
            Statement::VariableDeclaration(mut decl) => {
                let init = decl.init.take();
                let ty = self.resolve_type(&decl.ty)?;
                decl.var = Some(self.declare_variable(&decl.name, ty, self.storage())?);

                let target = Expression::identifier(decl.name.name.clone(), decl.name.span);
                out.push(Statement::VariableDeclaration(decl));
                if let Some(init) = init {
                    let assign = Expression::binary(BinaryOperator::Assign, target, init);
                    out.push(Statement::expression(self.analyze_expression(assign)?));
                }
            }
            Statement::FunctionDeclaration(func) => {
                let id = self.declare_function(&func, None)?;
                let func = self.analyze_function_body(func, id)?;
                out.push(Statement::FunctionDeclaration(func));
            }
            Statement::ClassDeclaration(class) => {
                out.push(Statement::ClassDeclaration(self.analyze_class(class)?));
            }
            Statement::Expression(stmt) => {
                out.push(Statement::expression(
                    self.analyze_expression(stmt.expression)?,
                ));
            }
            Statement::Block(block) => {
                out.push(Statement::Block(self.analyze_block(block)?));
            }
            Statement::Print(stmt) => {
                let argument = self.analyze_word(stmt.argument, "print")?;
                out.push(Statement::Print(PrintStatement {
                    argument,
                    span: stmt.span,
                }));
            }
            Statement::Return(stmt) => {
                out.push(Statement::Return(self.analyze_return(stmt)?));
            }
            Statement::If(stmt) => {
                let test = self.analyze_word(stmt.test, "condition")?;
                let consequent = self.analyze_block(stmt.consequent)?;
                let alternate = stmt
                    .alternate
                    .map(|block| self.analyze_block(block))
                    .transpose()?;
                out.push(Statement::If(IfStatement {
                    test,
                    consequent,
                    alternate,
                }));
            }
            Statement::While(stmt) => {
                let test = self.analyze_word(stmt.test, "condition")?;
                let body = self.analyze_block(stmt.body)?;
                out.push(Statement::While(WhileStatement { test, body }));
            }
            Statement::For(stmt) => {
                out.push(Statement::For(self.analyze_for(stmt)?));
            }
        }
        Ok(())
    }

    fn analyze_block(&mut self, mut block: BlockStatement) -> Result<BlockStatement> {
        let scope = self.module.create_scope(self.scope, ScopeKind::Block);
        let saved = std::mem::replace(&mut self.scope, scope);
        block.body = self.analyze_statements(std::mem::take(&mut block.body))?;
        block.scope = Some(scope);
        self.scope = saved;
        Ok(block)
    }

    fn analyze_for(&mut self, stmt: ForStatement) -> Result<ForStatement> {
        // Loop variables live in a scope wrapping the body.
        let scope = self.module.create_scope(self.scope, ScopeKind::Block);
        let saved = std::mem::replace(&mut self.scope, scope);

        let init = self.analyze_statements(stmt.init)?;
        let test = self.analyze_word(stmt.test, "condition")?;
        let update = stmt
            .update
            .map(|update| self.analyze_expression(update))
            .transpose()?;
        let body = self.analyze_block(stmt.body)?;

        self.scope = saved;
        Ok(ForStatement {
            init,
            test,
            update,
            body,
            scope: Some(scope),
        })
    }

    fn analyze_return(&mut self, stmt: ReturnStatement) -> Result<ReturnStatement> {
        let line = stmt.span.line;
        let Some(function) = self.current().function else {
            return Err(self.error(
                SemanticErrorKind::TypeMismatch,
                line,
                "'return' outside of a function",
            ));
        };
        let name = self.module.func(function).name.clone();
        let expected = self.current().return_type.clone();

        let argument = match (stmt.argument, expected) {
            (None, None) => None,
            (Some(_), None) => {
                return Err(self.error(
                    SemanticErrorKind::TypeMismatch,
                    line,
                    format!("function '{}' does not return a value", name),
                ));
            }
            (None, Some(expected)) => {
                return Err(self.error(
                    SemanticErrorKind::TypeMismatch,
                    line,
                    format!(
                        "function '{}' must return a value of type '{}'",
                        name,
                        self.module.type_name(&expected)
                    ),
                ));
            }
            (Some(argument), Some(expected)) => {
                let (argument, ty) = self.analyze_value(argument)?;
                if ty != expected {
                    return Err(self.mismatch(
                        line,
                        format!(
                            "cannot return '{}' from function '{}' returning '{}'",
                            self.module.type_name(&ty),
                            name,
                            self.module.type_name(&expected)
                        ),
                    ));
                }
                Some(argument)
            }
        };

        Ok(ReturnStatement {
            argument,
            span: stmt.span,
        })
    }

    // ==================== Declarations ====================

    fn storage(&self) -> Storage {
        if self.current().function.is_some() {
            Storage::Local
        } else {
            Storage::Main
        }
    }

    fn declare_variable(&mut self, name: &Identifier, ty: Type, storage: Storage) -> Result<VarId> {
        let decl = VarDecl {
            name: name.name.clone(),
            ty,
            line: name.span.line,
            storage,
            offset: None,
            scope: self.scope,
        };
        self.module.declare_variable(decl).map_err(|kind| {
            self.error(
                kind,
                name.span.line,
                format!("name '{}' has already been declared", name.name),
            )
        })
    }

    fn resolve_type(&self, ty: &TypeExpr) -> Result<Type> {
        match ty {
            TypeExpr::Int(_) => Ok(Type::int()),
            TypeExpr::Named(name) => self
                .module
                .lookup_aggregate(self.scope, &name.name)
                .map(Type::Aggregate)
                .ok_or_else(|| {
                    self.error(
                        SemanticErrorKind::UndefinedName,
                        name.span.line,
                        format!("unknown type '{}'", name.name),
                    )
                }),
            TypeExpr::Pointer(base) => Ok(Type::pointer_to(self.resolve_type(base)?)),
            TypeExpr::Array(element, count) => {
                Ok(Type::array_of(self.resolve_type(element)?, *count))
            }
        }
    }

    /// True if storing a `ty` by value needs an aggregate still being declared.
    fn is_incomplete(&self, ty: &Type) -> bool {
        match ty {
            Type::Aggregate(id) => !self.module.aggregate(*id).complete,
            Type::Array(element, _) => self.is_incomplete(element),
            Type::Primitive(_) | Type::Pointer(_) => false,
        }
    }

    /// Declares a function or method signature and seeds its body scope.
    fn declare_function(
        &mut self,
        func: &FunctionDeclaration,
        owner: Option<AggregateId>,
    ) -> Result<FuncId> {
        let return_type = func
            .return_type
            .as_ref()
            .map(|ty| self.resolve_type(ty))
            .transpose()?;

        let declaring = self.scope;
        let body = self.module.create_scope(declaring, ScopeKind::Function);
        let id = self
            .module
            .declare_function(
                declaring,
                FuncDecl {
                    name: func.name.name.clone(),
                    params: Vec::new(),
                    return_type: return_type.clone(),
                    scope: body,
                    owner,
                    receiver: None,
                    frame_size: None,
                    line: func.name.span.line,
                },
            )
            .map_err(|kind| {
                self.error(
                    kind,
                    func.name.span.line,
                    format!("name '{}' has already been declared", func.name.name),
                )
            })?;

        let scope = self.module.scope_mut(body);
        scope.return_type = return_type;
        scope.function = Some(id);
        scope.aggregate = owner;

        let saved = std::mem::replace(&mut self.scope, body);

        if let Some(owner) = owner {
            let this = Identifier::new("this", func.name.span);
            let receiver = self.declare_variable(
                &this,
                Type::pointer_to(Type::Aggregate(owner)),
                Storage::Local,
            )?;
            self.module.func_mut(id).receiver = Some(receiver);
        }

        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            let ty = match self.resolve_type(&param.ty)? {
                Type::Array(element, _) => Type::Pointer(element),
                ty => ty,
            };
            params.push(self.declare_variable(&param.name, ty, Storage::Local)?);
        }
        self.module.func_mut(id).params = params;

        self.scope = saved;
        Ok(id)
    }

    fn analyze_function_body(
        &mut self,
        mut func: FunctionDeclaration,
        id: FuncId,
    ) -> Result<FunctionDeclaration> {
        let body = self.module.func(id).scope;
        let saved = std::mem::replace(&mut self.scope, body);
        func.body.body = self.analyze_statements(std::mem::take(&mut func.body.body))?;
        func.body.scope = Some(body);
        func.function = Some(id);
        self.scope = saved;

        if self.module.func(id).return_type.is_some() && !always_returns(&func.body.body) {
            return Err(self.mismatch(
                func.name.span.line,
                format!(
                    "function '{}' can reach its end without returning a value",
                    func.name.name
                ),
            ));
        }
        Ok(func)
    }

    fn analyze_class(&mut self, mut class: ClassDeclaration) -> Result<ClassDeclaration> {
        let outer = self.scope;
        let members = self.module.create_scope(outer, ScopeKind::Aggregate);
        let id = self
            .module
            .declare_aggregate(
                outer,
                AggregateDecl {
                    name: class.name.name.clone(),
                    members: Vec::new(),
                    methods: Vec::new(),
                    scope: members,
                    size: None,
                    complete: false,
                    line: class.name.span.line,
                },
            )
            .map_err(|kind| {
                self.error(
                    kind,
                    class.name.span.line,
                    format!("type '{}' has already been declared", class.name.name),
                )
            })?;
        self.module.scope_mut(members).aggregate = Some(id);
        self.scope = members;

        for member in &mut class.members {
            let ty = self.resolve_type(&member.ty)?;
            if self.is_incomplete(&ty) {
                return Err(self.mismatch(
                    member.name.span.line,
                    format!(
                        "member '{}' has incomplete type '{}'",
                        member.name.name,
                        self.module.type_name(&ty)
                    ),
                ));
            }
            let var = self.declare_variable(&member.name, ty, Storage::Member(id))?;
            member.var = Some(var);
            self.module.aggregate_mut(id).members.push(var);
        }
        self.module.aggregate_mut(id).complete = true;

        // Every signature first, so methods may call each other in any order.
        let mut ids = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let method_id = self.declare_function(method, Some(id))?;
            self.module.aggregate_mut(id).methods.push(method_id);
            ids.push(method_id);
        }
        let methods = std::mem::take(&mut class.methods);
        for (method, method_id) in methods.into_iter().zip(ids) {
            class
                .methods
                .push(self.analyze_function_body(method, method_id)?);
        }

        self.scope = outer;
        class.aggregate = Some(id);
        Ok(class)
    }

    // ==================== Expressions ====================

    /// Analyzes an expression that may be a call without a value.
    fn analyze_expression(&mut self, expr: Expression) -> Result<Expression> {
        let Expression { kind, span, .. } = expr;
        match kind {
            ExpressionKind::Constant(value) => {
                Ok(Expression::constant(value, span).typed(Type::int()))
            }
            ExpressionKind::Identifier(reference) => self.resolve_identifier(reference.name, span),
            ExpressionKind::Receiver(_) => self.resolve_receiver(span),
            ExpressionKind::Unary { operator, argument } => {
                self.analyze_unary(operator, *argument, span)
            }
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => self.analyze_binary(operator, *left, *right, span),
            ExpressionKind::Index { object, index } => self.analyze_index(*object, *index, span),
            ExpressionKind::Member {
                object,
                property,
                indirect,
                ..
            } => self.analyze_member(*object, property, indirect, span),
            ExpressionKind::Call(call) => self.analyze_call(call, span),
        }
    }

    /// Analyzes an expression that must produce a value.
    fn analyze_value(&mut self, expr: Expression) -> Result<(Expression, Type)> {
        let line = expr.line();
        let expr = self.analyze_expression(expr)?;
        match expr.ty.clone() {
            Some(ty) => Ok((expr, ty)),
            None => Err(self.mismatch(line, "expression does not produce a value")),
        }
    }

    /// Analyzes an expression that must produce a single word.
    fn analyze_word(&mut self, expr: Expression, context: &str) -> Result<Expression> {
        let line = expr.line();
        let (expr, ty) = self.analyze_value(expr)?;
        if !ty.is_word() {
            return Err(self.mismatch(
                line,
                format!(
                    "{} expects 'int' or a pointer, found '{}'",
                    context,
                    self.module.type_name(&ty)
                ),
            ));
        }
        Ok(expr)
    }

    fn resolve_identifier(&mut self, name: String, span: Span) -> Result<Expression> {
        let line = span.line;
        let var = match self.module.lookup(self.scope, &name) {
            Some((_, Binding::Variable(var))) => var,
            Some((_, Binding::Function(_))) => {
                return Err(self.mismatch(line, format!("'{}' is a function, not a value", name)));
            }
            None => return Err(self.undefined(line, format!("name '{}' is not defined", name))),
        };

        let decl = self.module.var(var);
        let ty = decl.ty.clone();
        match decl.storage {
            Storage::Member(owner) => {
                let Some(receiver) = self.receiver_for(owner) else {
                    return Err(self.undefined(line, format!("name '{}' is not defined", name)));
                };
                let this = Expression::new(ExpressionKind::Receiver(Some(receiver)), span)
                    .typed(Type::pointer_to(Type::Aggregate(owner)));
                return Ok(self.finish_member(this, Identifier::new(name, span), true, var, ty));
            }
            Storage::Local => {
                // Frames of other functions are not reachable.
                let owner = self.module.scope(decl.scope).function;
                if owner != self.current().function {
                    return Err(self.undefined(line, format!("name '{}' is not defined", name)));
                }
            }
            Storage::Main => {}
        }

        Ok(Expression::new(
            ExpressionKind::Identifier(Reference {
                name,
                var: Some(var),
            }),
            span,
        )
        .typed(ty))
    }

    fn resolve_receiver(&self, span: Span) -> Result<Expression> {
        let receiver = self
            .current()
            .function
            .and_then(|function| self.module.func(function).receiver);
        match receiver {
            Some(var) => Ok(Expression::new(ExpressionKind::Receiver(Some(var)), span)
                .typed(self.module.var(var).ty.clone())),
            None => Err(self.undefined(span.line, "'this' used outside of a method")),
        }
    }

    /// The receiver of the current method, if it is a method of `aggregate`.
    fn receiver_for(&self, aggregate: AggregateId) -> Option<VarId> {
        let function = self.module.func(self.current().function?);
        if function.owner == Some(aggregate) {
            function.receiver
        } else {
            None
        }
    }

    fn analyze_unary(
        &mut self,
        operator: UnaryOperator,
        argument: Expression,
        span: Span,
    ) -> Result<Expression> {
        let line = span.line;
        let (argument, ty) = self.analyze_value(argument)?;

        let result = match operator {
            UnaryOperator::AddressOf => {
                if !argument.is_lvalue() {
                    return Err(self.error(
                        SemanticErrorKind::InvalidDereference,
                        line,
                        "cannot take the address of this expression",
                    ));
                }
                Type::pointer_to(ty)
            }
            UnaryOperator::Deref => match ty {
                Type::Pointer(base) => *base,
                other => {
                    return Err(self.error(
                        SemanticErrorKind::InvalidDereference,
                        line,
                        format!(
                            "cannot dereference non-pointer type '{}'",
                            self.module.type_name(&other)
                        ),
                    ));
                }
            },
            UnaryOperator::Minus | UnaryOperator::Plus => {
                if !ty.is_word() {
                    return Err(self.mismatch(
                        line,
                        format!(
                            "invalid operand '{}' to unary operator",
                            self.module.type_name(&ty)
                        ),
                    ));
                }
                ty
            }
        };

        Ok(Expression::unary(operator, argument, span).typed(result))
    }

    fn analyze_binary(
        &mut self,
        operator: BinaryOperator,
        left: Expression,
        right: Expression,
        span: Span,
    ) -> Result<Expression> {
        if let Some(base) = operator.compound_base() {
            let value = Expression::binary(base, left.clone(), right);
            return self.analyze_binary(BinaryOperator::Assign, left, value, span);
        }

        let line = span.line;
        let (left, left_ty) = self.analyze_value(left)?;

        if operator == BinaryOperator::Assign && !left.is_lvalue() {
            return Err(self.error(
                SemanticErrorKind::NotAnLvalue,
                line,
                "left side of assignment is not assignable",
            ));
        }

        let (right, right_ty) = self.analyze_value(right)?;

        let compatible = left_ty == right_ty
            && match &left_ty {
                Type::Primitive(_) | Type::Pointer(_) => true,
                Type::Aggregate(_) => operator == BinaryOperator::Assign,
                Type::Array(..) => false,
            };
        if !compatible {
            let message = if operator == BinaryOperator::Assign {
                format!(
                    "cannot assign '{}' to '{}'",
                    self.module.type_name(&right_ty),
                    self.module.type_name(&left_ty)
                )
            } else {
                format!(
                    "invalid operands '{}' and '{}' to '{}'",
                    self.module.type_name(&left_ty),
                    self.module.type_name(&right_ty),
                    operator.as_str()
                )
            };
            return Err(self.mismatch(line, message));
        }

        let result = if operator.is_comparison() {
            Type::int()
        } else {
            left_ty
        };

        Ok(Expression {
            kind: ExpressionKind::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
            ty: Some(result),
        })
    }

    fn analyze_index(
        &mut self,
        object: Expression,
        index: Expression,
        span: Span,
    ) -> Result<Expression> {
        let line = span.line;
        let (object, object_ty) = self.analyze_value(object)?;
        if matches!(object_ty, Type::Array(..)) && !object.is_lvalue() {
            return Err(self.temporary(line, "cannot index an array that is not stored"));
        }
        let Some(element) = object_ty.element().cloned() else {
            return Err(self.error(
                SemanticErrorKind::NotSubscriptable,
                line,
                format!(
                    "'{}' is not subscriptable",
                    self.module.type_name(&object_ty)
                ),
            ));
        };

        let (index, index_ty) = self.analyze_value(index)?;
        if !index_ty.is_int() {
            return Err(self.mismatch(
                line,
                format!(
                    "array subscript must be 'int', found '{}'",
                    self.module.type_name(&index_ty)
                ),
            ));
        }

        Ok(Expression::new(
            ExpressionKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            span,
        )
        .typed(element))
    }

    /// Checks the access form against the object's type and returns the aggregate.
    fn access_target(&self, ty: &Type, indirect: bool, line: u32) -> Result<AggregateId> {
        let (aggregate, through_pointer) = match ty {
            Type::Aggregate(id) => (*id, false),
            Type::Pointer(base) => match base.as_ref() {
                Type::Aggregate(id) => (*id, true),
                _ => return Err(self.not_an_aggregate(ty, line)),
            },
            _ => return Err(self.not_an_aggregate(ty, line)),
        };

        if through_pointer != indirect {
            let (used, wanted) = if indirect { ("->", ".") } else { (".", "->") };
            return Err(self.error(
                SemanticErrorKind::InvalidAccessForm,
                line,
                format!(
                    "'{}' used on '{}'; use '{}'",
                    used,
                    self.module.type_name(ty),
                    wanted
                ),
            ));
        }

        Ok(aggregate)
    }

    fn analyze_member(
        &mut self,
        object: Expression,
        property: Identifier,
        indirect: bool,
        span: Span,
    ) -> Result<Expression> {
        let line = span.line;
        let (object, object_ty) = self.analyze_value(object)?;
        let aggregate = self.access_target(&object_ty, indirect, line)?;
        if !indirect && !object.is_lvalue() {
            return Err(self.temporary(
                line,
                format!("cannot access member '{}' of a temporary", property.name),
            ));
        }

        let Some(member) = self.module.member(aggregate, &property.name) else {
            return Err(self.undefined(
                property.span.line,
                format!(
                    "'{}' has no member named '{}'",
                    self.module.aggregate(aggregate).name,
                    property.name
                ),
            ));
        };

        let ty = self.module.var(member).ty.clone();
        Ok(self.finish_member(object, property, indirect, member, ty))
    }

    /// Builds a typed member node; array members decay to a pointer to their first element.
    fn finish_member(
        &self,
        object: Expression,
        property: Identifier,
        indirect: bool,
        member: VarId,
        ty: Type,
    ) -> Expression {
        let span = object.span;
        let access = Expression::new(
            ExpressionKind::Member {
                object: Box::new(object),
                property,
                indirect,
                member: Some(member),
            },
            span,
        );

        match ty {
            Type::Array(element, count) => {
                let access = access.typed(Type::Array(element.clone(), count));
                Expression::unary(UnaryOperator::AddressOf, access, span)
                    .typed(Type::Pointer(element))
            }
            ty => access.typed(ty),
        }
    }

    fn analyze_call(&mut self, call: CallExpression, span: Span) -> Result<Expression> {
        let line = span.line;
        let CallExpression {
            callee,
            receiver,
            indirect,
            arguments,
            ..
        } = call;

        let (function, receiver) = match receiver {
            Some(object) => {
                let (object, object_ty) = self.analyze_value(*object)?;
                let aggregate = self.access_target(&object_ty, indirect, line)?;
                let Some(method) = self.module.method(aggregate, &callee.name) else {
                    return Err(self.undefined(
                        callee.span.line,
                        format!(
                            "'{}' has no method named '{}'",
                            self.module.aggregate(aggregate).name,
                            callee.name
                        ),
                    ));
                };
                let pointer = if indirect {
                    object
                } else {
                    if !object.is_lvalue() {
                        return Err(self.temporary(
                            line,
                            format!("cannot call '{}' on a temporary", callee.name),
                        ));
                    }
                    Expression::unary(UnaryOperator::AddressOf, object, span)
                        .typed(Type::pointer_to(Type::Aggregate(aggregate)))
                };
                (method, Some(pointer))
            }
            None => match self.module.lookup(self.scope, &callee.name) {
                Some((_, Binding::Function(function))) => {
                    let receiver = match self.module.func(function).owner {
                        Some(owner) => {
                            let Some(var) = self.receiver_for(owner) else {
                                return Err(self.undefined(
                                    line,
                                    format!("function '{}' is not defined", callee.name),
                                ));
                            };
                            Some(
                                Expression::new(ExpressionKind::Receiver(Some(var)), span)
                                    .typed(Type::pointer_to(Type::Aggregate(owner))),
                            )
                        }
                        None => None,
                    };
                    (function, receiver)
                }
                Some((_, Binding::Variable(_))) => {
                    return Err(
                        self.mismatch(line, format!("'{}' is not a function", callee.name))
                    );
                }
                None => {
                    return Err(self.undefined(
                        line,
                        format!("function '{}' is not defined", callee.name),
                    ));
                }
            },
        };

        let decl = self.module.func(function);
        let params: Vec<Type> = decl
            .params
            .iter()
            .map(|param| self.module.var(*param).ty.clone())
            .collect();
        let return_type = decl.return_type.clone();

        if arguments.len() != params.len() {
            return Err(self.error(
                SemanticErrorKind::ArityMismatch,
                line,
                format!(
                    "function '{}' expects {} argument(s) but {} were given",
                    callee.name,
                    params.len(),
                    arguments.len()
                ),
            ));
        }

        let mut analyzed = Vec::with_capacity(arguments.len());
        for (position, (argument, expected)) in arguments.into_iter().zip(&params).enumerate() {
            let (argument, ty) = self.analyze_value(argument)?;
            if matches!(ty, Type::Array(..)) && !argument.is_lvalue() {
                return Err(self.temporary(
                    line,
                    format!(
                        "argument {} of '{}' is an array that is not stored",
                        position + 1,
                        callee.name
                    ),
                ));
            }
            let (argument, ty) = decay_array(argument, ty);
            if &ty != expected {
                return Err(self.mismatch(
                    line,
                    format!(
                        "argument {} of '{}' expects '{}' but got '{}'",
                        position + 1,
                        callee.name,
                        self.module.type_name(expected),
                        self.module.type_name(&ty)
                    ),
                ));
            }
            analyzed.push(argument);
        }

        Ok(Expression {
            kind: ExpressionKind::Call(CallExpression {
                callee,
                indirect: receiver.is_some(),
                receiver: receiver.map(Box::new),
                arguments: analyzed,
                function: Some(function),
            }),
            span,
            ty: return_type,
        })
    }

    // ==================== Helpers ====================

    fn current(&self) -> &Scope {
        self.module.scope(self.scope)
    }

    fn error(&self, kind: SemanticErrorKind, line: u32, message: impl Into<String>) -> SemanticError {
        SemanticError::new(kind, Location::new(self.unit.clone(), line), message)
    }

    fn mismatch(&self, line: u32, message: impl Into<String>) -> SemanticError {
        self.error(SemanticErrorKind::TypeMismatch, line, message)
    }

    fn temporary(&self, line: u32, message: impl Into<String>) -> SemanticError {
        self.error(SemanticErrorKind::NotAnLvalue, line, message)
    }

    fn undefined(&self, line: u32, message: impl Into<String>) -> SemanticError {
        self.error(SemanticErrorKind::UndefinedName, line, message)
    }

    fn not_an_aggregate(&self, ty: &Type, line: u32) -> SemanticError {
        self.error(
            SemanticErrorKind::NotAnAggregate,
            line,
            format!(
                "'{}' is not a struct or class",
                self.module.type_name(ty)
            ),
        )
    }
}

/// Whether every path through `statements` ends in a `return`.
fn always_returns(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Return(_) => true,
        Statement::Block(block) => always_returns(&block.body),
        Statement::If(stmt) => stmt.alternate.as_ref().is_some_and(|alternate| {
            always_returns(&stmt.consequent.body) && always_returns(&alternate.body)
        }),
        _ => false,
    })
}

/// Rewrites an array-typed argument `a` to `&a[0]`.
fn decay_array(argument: Expression, ty: Type) -> (Expression, Type) {
    match ty {
        Type::Array(element, _) => {
            let span = argument.span;
            let first = Expression::index(argument, Expression::constant(0, span).typed(Type::int()))
                .typed((*element).clone());
            let pointer = Type::Pointer(element);
            (
                Expression::unary(UnaryOperator::AddressOf, first, span).typed(pointer.clone()),
                pointer,
            )
        }
        ty => (argument, ty),
    }
}
