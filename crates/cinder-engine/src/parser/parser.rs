// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The main parser implementation.

use rustc_hash::FxHashSet;

use crate::ast::*;
use crate::error::{Error, Location};
use crate::lexer::{Scanner, Span, Token, TokenKind};

/// A recursive descent parser for Cinder.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    pub(super) current: Token,
    pub(super) previous: Token,
    unit: String,
    /// Names declared with `class`/`struct`; they start a type
    class_names: FxHashSet<String>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self::with_unit(source, "<input>")
    }

    /// Creates a parser whose diagnostics name `unit` as the source.
    pub fn with_unit(source: &'a str, unit: impl Into<String>) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0, 1)),
            unit: unit.into(),
            class_names: FxHashSet::default(),
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, Error> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program::new(body))
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> Result<Statement, Error> {
        match &self.current.kind {
            TokenKind::Fn => Ok(Statement::FunctionDeclaration(
                self.parse_function_declaration()?,
            )),
            TokenKind::Class | TokenKind::Struct => self.parse_class_declaration(),
            TokenKind::Print => self.parse_print_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            _ if self.at_type_start() => {
                let declaration = self.parse_variable_declaration()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::VariableDeclaration(declaration))
            }
            _ => {
                let expression = self.parse_expression()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Statement::expression(expression))
            }
        }
    }

    fn parse_class_declaration(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'class' or 'struct'
        let name = self.expect_identifier()?;
        // Registered first so members may refer to their own type.
        self.class_names.insert(name.name.clone());

        self.expect(&TokenKind::LeftBrace)?;
        let mut members = Vec::new();
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.check(&TokenKind::Fn) {
                methods.push(self.parse_function_declaration()?);
            } else if self.at_type_start() {
                let member = self.parse_variable_declaration()?;
                if member.init.is_some() {
                    return Err(self.error_at(
                        member.name.span,
                        format!("member '{}' cannot have an initializer", member.name.name),
                    ));
                }
                self.expect(&TokenKind::Semicolon)?;
                members.push(member);
            } else {
                return Err(self.unexpected("member declaration"));
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }

        Ok(Statement::ClassDeclaration(ClassDeclaration {
            name,
            members,
            methods,
            aggregate: None,
        }))
    }

    fn parse_function_declaration(&mut self) -> Result<FunctionDeclaration, Error> {
        self.expect(&TokenKind::Fn)?;
        let name = self.expect_identifier()?;

        self.expect(&TokenKind::LeftParen)?;
        let params = self.parse_parameters()?;
        self.expect(&TokenKind::RightParen)?;

        let return_type = if self.check(&TokenKind::Colon) {
            self.advance();
            if !self.at_type_start() {
                return Err(self.error_at(name.span, "function has no return type"));
            }
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(FunctionDeclaration {
            name,
            params,
            return_type,
            body,
            function: None,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, Error> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RightParen) {
            return Ok(params);
        }

        loop {
            if !self.at_type_start() {
                return Err(self.unexpected("parameter declaration"));
            }
            let ty = self.parse_type()?;
            let name = self.expect_identifier()?;
            let ty = self.parse_declarator_suffix(ty)?;
            params.push(Parameter { ty, name });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(params)
    }

    /// Parses `T name` or `T name = init`, without the semicolon.
    pub(super) fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration, Error> {
        let ty = self.parse_type()?;
        let name = self.expect_identifier()?;
        let ty = self.parse_declarator_suffix(ty)?;

        let init = if self.check(&TokenKind::Equal) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(VariableDeclaration {
            ty,
            name,
            init,
            var: None,
        })
    }

    /// Parses a base type followed by `*` and `[N]` suffixes, applied left to right.
    pub(super) fn parse_type(&mut self) -> Result<TypeExpr, Error> {
        let mut ty = match &self.current.kind {
            TokenKind::Int => {
                self.advance();
                TypeExpr::Int(self.previous.span)
            }
            TokenKind::Identifier(name) if self.class_names.contains(name) => {
                let id = Identifier::new(name.clone(), self.current.span);
                self.advance();
                TypeExpr::Named(id)
            }
            _ => return Err(self.unexpected("type")),
        };

        loop {
            if self.check(&TokenKind::Star) {
                self.advance();
                ty = TypeExpr::Pointer(Box::new(ty));
            } else if self.check(&TokenKind::LeftBracket) {
                let count = self.parse_array_length()?;
                ty = TypeExpr::Array(Box::new(ty), count);
            } else {
                break;
            }
        }

        Ok(ty)
    }

    /// Parses C-style dimensions after a declared name: `int a[2][3]`.
    fn parse_declarator_suffix(&mut self, base: TypeExpr) -> Result<TypeExpr, Error> {
        let mut dims = Vec::new();
        while self.check(&TokenKind::LeftBracket) {
            dims.push(self.parse_array_length()?);
        }
        // The innermost dimension is the last one written.
        Ok(dims
            .into_iter()
            .rev()
            .fold(base, |ty, count| TypeExpr::Array(Box::new(ty), count)))
    }

    fn parse_array_length(&mut self) -> Result<u32, Error> {
        self.expect(&TokenKind::LeftBracket)?;
        let count = match self.current.kind {
            TokenKind::Number(n) => u32::try_from(n)
                .ok()
                .filter(|count| *count > 0)
                .ok_or_else(|| self.error_at(self.current.span, "invalid array length"))?,
            _ => return Err(self.unexpected("array length")),
        };
        self.advance();
        self.expect(&TokenKind::RightBracket)?;
        Ok(count)
    }

    fn parse_print_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'print'
        let span = self.previous.span;
        let argument = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Print(PrintStatement { argument, span }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'return'
        let span = self.previous.span;

        let argument = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Return(ReturnStatement { argument, span }))
    }

    fn parse_if_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;

        let consequent = self.parse_body()?;
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(self.parse_body()?)
        } else {
            None
        };

        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_body()?;
        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'for'
        self.expect(&TokenKind::LeftParen)?;

        let mut init = Vec::new();
        if !self.check(&TokenKind::Semicolon) {
            if self.at_type_start() {
                init.push(Statement::VariableDeclaration(
                    self.parse_variable_declaration()?,
                ));
            } else {
                init.push(Statement::expression(self.parse_expression()?));
            }
        }
        self.expect(&TokenKind::Semicolon)?;

        let test = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = self.parse_body()?;

        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            scope: None,
        }))
    }

    /// A braced block, or a single statement wrapped as one.
    fn parse_body(&mut self) -> Result<BlockStatement, Error> {
        if self.check(&TokenKind::LeftBrace) {
            self.parse_block()
        } else {
            Ok(BlockStatement::new(vec![self.parse_statement()?]))
        }
    }

    fn parse_block(&mut self) -> Result<BlockStatement, Error> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(BlockStatement::new(body))
    }

    // Helper methods

    fn at_type_start(&self) -> bool {
        match &self.current.kind {
            TokenKind::Int => true,
            TokenKind::Identifier(name) => self.class_names.contains(name),
            _ => false,
        }
    }

    pub(super) fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    pub(super) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    pub(super) fn expect(&mut self, kind: &TokenKind) -> Result<(), Error> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_at(
                self.current.span,
                format!("expected '{}' but found '{}'", kind, self.current.kind),
            ))
        }
    }

    pub(super) fn expect_identifier(&mut self) -> Result<Identifier, Error> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier::new(name.clone(), self.current.span);
            self.advance();
            Ok(id)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    pub(super) fn unexpected(&self, what: &str) -> Error {
        self.error_at(
            self.current.span,
            format!("expected {} but found '{}'", what, self.current.kind),
        )
    }

    pub(super) fn error_at(&self, span: Span, message: impl Into<String>) -> Error {
        Error::Syntax {
            location: Location::new(self.unit.clone(), span.line),
            message: message.into(),
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }
}
