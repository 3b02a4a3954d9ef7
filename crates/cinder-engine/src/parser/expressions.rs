// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression parsing.
//!
//! Expression parsing uses recursive descent with operator precedence.
//!
//! ## Precedence Table (lowest to highest)
//!
//! | Precedence | Operators | Method |
//! |------------|-----------|--------|
//! | 1 | `=` `+=` `-=` `*=` `/=` (right-assoc) | `parse_assignment` |
//! | 2 | `==` `!=` | `parse_equality` |
//! | 3 | `<` `>` `<=` `>=` | `parse_relational` |
//! | 4 | `+` `-` | `parse_additive` |
//! | 5 | `*` `/` | `parse_multiplicative` |
//! | 6 | `-` `+` `&` `*` (prefix) | `parse_unary` |
//! | 7 | `[]` `()` `.` `->` | `parse_postfix` |
//! | 8 | literals, names, `this`, `( )` | `parse_primary` |

use super::Parser;
use crate::ast::*;
use crate::error::Error;
use crate::lexer::TokenKind;

impl<'a> Parser<'a> {
    /// Parses an expression.
    pub fn parse_expression(&mut self) -> Result<Expression, Error> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expression, Error> {
        let target = self.parse_equality()?;

        let operator = match &self.current.kind {
            TokenKind::Equal => BinaryOperator::Assign,
            TokenKind::PlusEqual => BinaryOperator::AddAssign,
            TokenKind::MinusEqual => BinaryOperator::SubAssign,
            TokenKind::StarEqual => BinaryOperator::MulAssign,
            TokenKind::SlashEqual => BinaryOperator::DivAssign,
            _ => return Ok(target),
        };
        self.advance();
        let value = self.parse_assignment()?;

        Ok(Expression::binary(operator, target, value))
    }

    fn parse_equality(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_relational()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::EqualEqual => BinaryOperator::Eq,
                TokenKind::BangEqual => BinaryOperator::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expression::binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_additive()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Less => BinaryOperator::Lt,
                TokenKind::LessEqual => BinaryOperator::Le,
                TokenKind::Greater => BinaryOperator::Gt,
                TokenKind::GreaterEqual => BinaryOperator::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expression::binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, Error> {
        let operator = match &self.current.kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Ampersand => UnaryOperator::AddressOf,
            TokenKind::Star => UnaryOperator::Deref,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let span = self.previous.span;
        let argument = self.parse_unary()?;

        Ok(Expression::unary(operator, argument, span))
    }

    fn parse_postfix(&mut self) -> Result<Expression, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            match &self.current.kind {
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket)?;
                    expr = Expression::index(expr, index);
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    self.expect(&TokenKind::RightParen)?;
                    expr = self.make_call(expr, arguments)?;
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let indirect = self.check(&TokenKind::Arrow);
                    self.advance();
                    let property = self.expect_identifier()?;
                    expr = Expression::member(expr, property, indirect);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Turns `name(args)` and `obj.name(args)` into call nodes.
    fn make_call(
        &self,
        callee: Expression,
        arguments: Vec<Expression>,
    ) -> Result<Expression, Error> {
        let span = callee.span;
        match callee.kind {
            ExpressionKind::Identifier(reference) => Ok(Expression::call(
                Identifier::new(reference.name, span),
                arguments,
            )),
            ExpressionKind::Member {
                object,
                property,
                indirect,
                ..
            } => Ok(Expression::method_call(
                *object, property, indirect, arguments,
            )),
            _ => Err(self.error_at(span, "expression is not callable")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, Error> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression, Error> {
        let span = self.current.span;
        match &self.current.kind {
            TokenKind::Number(n) => {
                let value = i32::try_from(*n)
                    .map_err(|_| self.error_at(span, "integer literal out of range"))?;
                self.advance();
                Ok(Expression::constant(value, span))
            }
            TokenKind::Identifier(name) => {
                let expr = Expression::identifier(name.clone(), span);
                self.advance();
                Ok(expr)
            }
            TokenKind::This => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Receiver(None), span))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(src: &str) -> Expression {
        let mut parser = Parser::new(src);
        parser.parse_expression().unwrap()
    }

    fn operator(expr: &Expression) -> BinaryOperator {
        match &expr.kind {
            ExpressionKind::Binary { operator, .. } => *operator,
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // x + y * 2 groups as x + (y * 2)
        let expr = parse_expr("x + y * 2");
        assert_eq!(operator(&expr), BinaryOperator::Add);
        let ExpressionKind::Binary { right, .. } = &expr.kind else {
            unreachable!()
        };
        assert_eq!(operator(right), BinaryOperator::Mul);
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse_expr("a - b - c");
        let ExpressionKind::Binary { left, .. } = &expr.kind else {
            unreachable!()
        };
        assert_eq!(operator(left), BinaryOperator::Sub);
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let expr = parse_expr("a = b = 3");
        assert_eq!(operator(&expr), BinaryOperator::Assign);
        let ExpressionKind::Binary { right, .. } = &expr.kind else {
            unreachable!()
        };
        assert_eq!(operator(right), BinaryOperator::Assign);
    }

    #[test]
    fn test_compound_assignment() {
        assert_eq!(operator(&parse_expr("x -= 1")), BinaryOperator::SubAssign);
        assert_eq!(operator(&parse_expr("x /= 2")), BinaryOperator::DivAssign);
    }

    #[test]
    fn test_comparison_below_arithmetic() {
        assert_eq!(operator(&parse_expr("i < n + 1")), BinaryOperator::Lt);
        assert_eq!(operator(&parse_expr("a == b < c")), BinaryOperator::Eq);
    }

    #[test]
    fn test_unary_operators() {
        let expr = parse_expr("-*&x");
        let ExpressionKind::Unary { operator, argument } = expr.kind else {
            panic!("expected unary");
        };
        assert_eq!(operator, UnaryOperator::Minus);
        assert!(matches!(
            argument.kind,
            ExpressionKind::Unary {
                operator: UnaryOperator::Deref,
                ..
            }
        ));
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_expr("p->items[2].value");
        let ExpressionKind::Member {
            object, indirect, ..
        } = expr.kind
        else {
            panic!("expected member");
        };
        assert!(!indirect);
        assert!(matches!(object.kind, ExpressionKind::Index { .. }));
    }

    #[test]
    fn test_call_forms() {
        let ExpressionKind::Call(call) = parse_expr("add(1, 2)").kind else {
            panic!("expected call");
        };
        assert_eq!(call.callee.name, "add");
        assert_eq!(call.arguments.len(), 2);
        assert!(call.receiver.is_none());

        let ExpressionKind::Call(call) = parse_expr("p->area()").kind else {
            panic!("expected method call");
        };
        assert!(call.indirect);
        assert!(call.receiver.is_some());
    }

    #[test]
    fn test_this_and_parentheses() {
        assert!(matches!(
            parse_expr("this").kind,
            ExpressionKind::Receiver(None)
        ));
        assert_eq!(operator(&parse_expr("(1 + 2) * 3")), BinaryOperator::Mul);
    }

    #[test]
    fn test_not_callable() {
        let mut parser = Parser::new("(1)(2)");
        assert!(matches!(
            parser.parse_expression(),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_literal_out_of_range() {
        let mut parser = Parser::new("2147483648");
        assert!(parser.parse_expression().is_err());
        assert!(matches!(
            parse_expr("2147483647").kind,
            ExpressionKind::Constant(i32::MAX)
        ));
    }
}
