// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions for Cinder.
//!
//! The parser produces an unannotated tree: every `Option` slot holding an
//! arena id or a [`Type`] is `None`. The semantic analyzer fills those slots
//! in and rewrites sugar, so later stages can rely on them being set.

use crate::lexer::Span;
use crate::sema::types::{AggregateId, FuncId, ScopeId, Type, VarId};

/// A complete Cinder program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The top-level statements in source order
    pub body: Vec<Statement>,
    /// The root scope, set by analysis
    pub scope: Option<ScopeId>,
}

impl Program {
    /// Creates an unannotated program.
    pub fn new(body: Vec<Statement>) -> Self {
        Self { body, scope: None }
    }
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
    /// Where it appeared
    pub span: Span,
}

impl Identifier {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `int`
    Int(Span),
    /// A class or struct name
    Named(Identifier),
    /// `T*`
    Pointer(Box<TypeExpr>),
    /// `T[N]`
    Array(Box<TypeExpr>, u32),
}

impl TypeExpr {
    /// Line of the base type name.
    pub fn line(&self) -> u32 {
        match self {
            TypeExpr::Int(span) => span.line,
            TypeExpr::Named(name) => name.span.line,
            TypeExpr::Pointer(base) | TypeExpr::Array(base, _) => base.line(),
        }
    }
}

/// A Cinder statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `T name;` or `T name = init;`
    VariableDeclaration(VariableDeclaration),
    /// `fn name(params): T { ... }`
    FunctionDeclaration(FunctionDeclaration),
    /// `class Name { ... }` or `struct Name { ... }`
    ClassDeclaration(ClassDeclaration),
    /// Expression statement
    Expression(ExpressionStatement),
    /// Block statement { ... }
    Block(BlockStatement),
    /// `print expr;`
    Print(PrintStatement),
    /// `return;` or `return expr;`
    Return(ReturnStatement),
    /// If statement
    If(IfStatement),
    /// While statement
    While(WhileStatement),
    /// For statement
    For(ForStatement),
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The declared type
    pub ty: TypeExpr,
    /// The identifier being declared
    pub name: Identifier,
    /// Optional initializer; analysis moves it into a separate assignment
    pub init: Option<Expression>,
    /// The declared variable, set by analysis
    pub var: Option<VarId>,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// The declared type
    pub ty: TypeExpr,
    /// The parameter name
    pub name: Identifier,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    /// The function name
    pub name: Identifier,
    /// The parameters
    pub params: Vec<Parameter>,
    /// Declared return type, `None` for procedures
    pub return_type: Option<TypeExpr>,
    /// The function body
    pub body: BlockStatement,
    /// The declared function, set by analysis
    pub function: Option<FuncId>,
}

/// A class or struct declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    /// The type name
    pub name: Identifier,
    /// Data members in declaration order
    pub members: Vec<VariableDeclaration>,
    /// Methods in declaration order
    pub methods: Vec<FunctionDeclaration>,
    /// The declared aggregate, set by analysis
    pub aggregate: Option<AggregateId>,
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    /// The statements in the block
    pub body: Vec<Statement>,
    /// The block's scope, set by analysis
    pub scope: Option<ScopeId>,
}

impl BlockStatement {
    /// Creates an unannotated block.
    pub fn new(body: Vec<Statement>) -> Self {
        Self { body, scope: None }
    }
}

/// A print statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintStatement {
    /// The printed value
    pub argument: Expression,
    /// The `print` keyword
    pub span: Span,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    /// The returned value
    pub argument: Option<Expression>,
    /// The `return` keyword
    pub span: Span,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then branch
    pub consequent: BlockStatement,
    /// The optional else branch
    pub alternate: Option<BlockStatement>,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The body
    pub body: BlockStatement,
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// Initializer statements, run once
    pub init: Vec<Statement>,
    /// The condition
    pub test: Expression,
    /// Step expression, run after each iteration
    pub update: Option<Expression>,
    /// The body
    pub body: BlockStatement,
    /// The scope holding loop variables, set by analysis
    pub scope: Option<ScopeId>,
}

/// An expression together with its source span and resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// What kind of expression this is
    pub kind: ExpressionKind,
    /// Where it appeared
    pub span: Span,
    /// The resolved type, set by analysis; `None` for procedure calls
    pub ty: Option<Type>,
}

/// A name reference and the variable it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// The referenced name
    pub name: String,
    /// The resolved variable, set by analysis
    pub var: Option<VarId>,
}

/// The shape of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Integer literal
    Constant(i32),
    /// A variable reference
    Identifier(Reference),
    /// `this`, resolved to the method's receiver
    Receiver(Option<VarId>),
    /// Prefix operator
    Unary {
        /// The operator
        operator: UnaryOperator,
        /// The operand
        argument: Box<Expression>,
    },
    /// Infix operator, including assignment
    Binary {
        /// The operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// `object[index]`
    Index {
        /// The array or pointer
        object: Box<Expression>,
        /// The subscript
        index: Box<Expression>,
    },
    /// `object.property` or `object->property`
    Member {
        /// The aggregate or pointer to aggregate
        object: Box<Expression>,
        /// The member name
        property: Identifier,
        /// True for `->`
        indirect: bool,
        /// The resolved member, set by analysis
        member: Option<VarId>,
    },
    /// Function or method call
    Call(CallExpression),
}

/// A call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// The function or method name
    pub callee: Identifier,
    /// The object a method is called on; after analysis always a pointer
    pub receiver: Option<Box<Expression>>,
    /// True for `p->m()`
    pub indirect: bool,
    /// The arguments
    pub arguments: Vec<Expression>,
    /// The resolved function, set by analysis
    pub function: Option<FuncId>,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// &
    AddressOf,
    /// *
    Deref,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Sub,
    /// *
    Mul,
    /// /
    Div,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// ==
    Eq,
    /// !=
    Ne,
    /// =
    Assign,
    /// +=
    AddAssign,
    /// -=
    SubAssign,
    /// *=
    MulAssign,
    /// /=
    DivAssign,
}

impl BinaryOperator {
    /// Returns true for the six comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
                | BinaryOperator::Eq
                | BinaryOperator::Ne
        )
    }

    /// For compound assignments, the arithmetic operator they apply.
    pub fn compound_base(self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::AddAssign => Some(BinaryOperator::Add),
            BinaryOperator::SubAssign => Some(BinaryOperator::Sub),
            BinaryOperator::MulAssign => Some(BinaryOperator::Mul),
            BinaryOperator::DivAssign => Some(BinaryOperator::Div),
            _ => None,
        }
    }

    /// The operator as written in source.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Assign => "=",
            BinaryOperator::AddAssign => "+=",
            BinaryOperator::SubAssign => "-=",
            BinaryOperator::MulAssign => "*=",
            BinaryOperator::DivAssign => "/=",
        }
    }
}

impl Expression {
    /// Creates an untyped expression.
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    /// Integer literal.
    pub fn constant(value: i32, span: Span) -> Self {
        Self::new(ExpressionKind::Constant(value), span)
    }

    /// Unresolved name reference.
    pub fn identifier(name: impl Into<String>, span: Span) -> Self {
        Self::new(
            ExpressionKind::Identifier(Reference {
                name: name.into(),
                var: None,
            }),
            span,
        )
    }

    /// Prefix operation.
    pub fn unary(operator: UnaryOperator, argument: Expression, span: Span) -> Self {
        Self::new(
            ExpressionKind::Unary {
                operator,
                argument: Box::new(argument),
            },
            span,
        )
    }

    /// Infix operation; takes the left operand's span.
    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        let span = left.span;
        Self::new(
            ExpressionKind::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    /// Subscript.
    pub fn index(object: Expression, index: Expression) -> Self {
        let span = object.span;
        Self::new(
            ExpressionKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            span,
        )
    }

    /// Member access.
    pub fn member(object: Expression, property: Identifier, indirect: bool) -> Self {
        let span = object.span;
        Self::new(
            ExpressionKind::Member {
                object: Box::new(object),
                property,
                indirect,
                member: None,
            },
            span,
        )
    }

    /// Call of a free function.
    pub fn call(callee: Identifier, arguments: Vec<Expression>) -> Self {
        let span = callee.span;
        Self::new(
            ExpressionKind::Call(CallExpression {
                callee,
                receiver: None,
                indirect: false,
                arguments,
                function: None,
            }),
            span,
        )
    }

    /// Call of a method on `receiver`.
    pub fn method_call(
        receiver: Expression,
        callee: Identifier,
        indirect: bool,
        arguments: Vec<Expression>,
    ) -> Self {
        let span = receiver.span;
        Self::new(
            ExpressionKind::Call(CallExpression {
                callee,
                receiver: Some(Box::new(receiver)),
                indirect,
                arguments,
                function: None,
            }),
            span,
        )
    }

    /// Returns the same expression with its type set.
    pub fn typed(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Returns true if this expression denotes a storage location.
    ///
    /// `.` and indexing into an array are addressable only when their object
    /// is; `->`, `*` and indexing through a pointer always are.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExpressionKind::Identifier(_) => true,
            ExpressionKind::Unary {
                operator: UnaryOperator::Deref,
                ..
            } => true,
            ExpressionKind::Member {
                object, indirect, ..
            } => *indirect || object.is_lvalue(),
            ExpressionKind::Index { object, .. } => match object.ty {
                Some(Type::Array(..)) => object.is_lvalue(),
                _ => true,
            },
            _ => false,
        }
    }

    /// The line this expression starts on.
    pub fn line(&self) -> u32 {
        self.span.line
    }
}

impl Statement {
    /// Wraps an expression as a statement.
    pub fn expression(expression: Expression) -> Self {
        Statement::Expression(ExpressionStatement { expression })
    }
}
