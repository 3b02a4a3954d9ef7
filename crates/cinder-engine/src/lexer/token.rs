// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Token definitions for the Cinder lexer.

use std::fmt;

/// A span in the source code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Line of the first character, starting at 1
    pub line: u32,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize, line: u32) -> Self {
        Self { start, end, line }
    }

    /// A zero-width span used for synthesized nodes.
    pub fn at_line(line: u32) -> Self {
        Self {
            start: 0,
            end: 0,
            line,
        }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The different kinds of tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Number(i64),
    /// Identifier
    Identifier(String),

    // Keywords
    /// int
    Int,
    /// if
    If,
    /// else
    Else,
    /// while
    While,
    /// for
    For,
    /// fn
    Fn,
    /// print
    Print,
    /// return
    Return,
    /// struct
    Struct,
    /// class
    Class,
    /// this
    This,

    // Punctuation
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// ,
    Comma,
    /// .
    Dot,
    /// ->
    Arrow,
    /// ;
    Semicolon,
    /// :
    Colon,

    // Operators
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// &
    Ampersand,
    /// =
    Equal,
    /// +=
    PlusEqual,
    /// -=
    MinusEqual,
    /// *=
    StarEqual,
    /// /=
    SlashEqual,
    /// ==
    EqualEqual,
    /// !=
    BangEqual,
    /// <
    Less,
    /// <=
    LessEqual,
    /// >
    Greater,
    /// >=
    GreaterEqual,

    // Special
    /// End of input
    Eof,
    /// A character that does not start any token
    Invalid(char),
}

impl TokenKind {
    /// Maps an identifier to its keyword, if it is one.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "int" => TokenKind::Int,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "fn" => TokenKind::Fn,
            "print" => TokenKind::Print,
            "return" => TokenKind::Return,
            "struct" => TokenKind::Struct,
            "class" => TokenKind::Class,
            "this" => TokenKind::This,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Number(n) => return write!(f, "{}", n),
            TokenKind::Identifier(name) => return write!(f, "{}", name),
            TokenKind::Invalid(ch) => return write!(f, "{}", ch),
            TokenKind::Int => "int",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Fn => "fn",
            TokenKind::Print => "print",
            TokenKind::Return => "return",
            TokenKind::Struct => "struct",
            TokenKind::Class => "class",
            TokenKind::This => "this",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Ampersand => "&",
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}
