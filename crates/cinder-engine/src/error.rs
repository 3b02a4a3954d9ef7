// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the Cinder engine.

use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// A source position: the originating unit and a 1-based line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location {
    /// Name of the compilation unit (usually a file path)
    pub unit: String,
    /// Line number, starting at 1
    pub line: u32,
}

impl Location {
    /// Creates a new location.
    pub fn new(unit: impl Into<String>, line: u32) -> Self {
        Self {
            unit: unit.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.line)
    }
}

/// The category of a semantic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticErrorKind {
    /// A name was declared twice in the same scope
    AlreadyDeclared,
    /// An identifier, type, member or function could not be found
    UndefinedName,
    /// Operand, assignment, argument or return types are incompatible
    TypeMismatch,
    /// Indexing something that is neither an array nor a pointer
    NotSubscriptable,
    /// Member access on something that is not a struct/class
    NotAnAggregate,
    /// `.` used through a pointer or `->` used on a value
    InvalidAccessForm,
    /// Wrong number of call arguments
    ArityMismatch,
    /// `*` on a non-pointer or `&` on a non-addressable operand
    InvalidDereference,
    /// Assignment to something that is not a storage location
    NotAnLvalue,
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticErrorKind::AlreadyDeclared => "AlreadyDeclared",
            SemanticErrorKind::UndefinedName => "UndefinedName",
            SemanticErrorKind::TypeMismatch => "TypeMismatch",
            SemanticErrorKind::NotSubscriptable => "NotSubscriptable",
            SemanticErrorKind::NotAnAggregate => "NotAnAggregate",
            SemanticErrorKind::InvalidAccessForm => "InvalidAccessForm",
            SemanticErrorKind::ArityMismatch => "ArityMismatch",
            SemanticErrorKind::InvalidDereference => "InvalidDereference",
            SemanticErrorKind::NotAnLvalue => "NotAnLvalue",
        };
        f.write_str(name)
    }
}

/// A diagnostic produced by the semantic analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {kind}: {message}")]
pub struct SemanticError {
    /// What went wrong
    pub kind: SemanticErrorKind,
    /// Where it went wrong
    pub location: Location,
    /// Human readable detail
    pub message: String,
}

impl SemanticError {
    /// Creates a new semantic error.
    pub fn new(kind: SemanticErrorKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }
}

/// Errors that can occur while compiling or running a program.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed source text
    #[error("{location}: SyntaxError: {message}")]
    Syntax {
        /// Where parsing stopped
        location: Location,
        /// What the parser expected
        message: String,
    },

    /// Name resolution or type checking failure
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// The instruction stream was rejected before execution
    #[error("LoadError: {0}")]
    Load(String),

    /// Fault raised while executing bytecode
    #[error("RuntimeError: {0}")]
    Runtime(String),

    /// Broken invariant inside layout or code generation
    #[error("InternalError: {0}")]
    Internal(String),

    /// Invalid configuration
    #[error("ConfigError: {0}")]
    Config(String),

    /// I/O error
    #[error("IOError: {0}")]
    Io(String),
}

impl Error {
    /// Returns the semantic error category, if this is a semantic error.
    pub fn semantic_kind(&self) -> Option<SemanticErrorKind> {
        match self {
            Error::Semantic(err) => Some(err.kind),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("main.cn", 12).to_string(), "main.cn:12");
    }

    #[test]
    fn test_semantic_error_display() {
        let err = SemanticError::new(
            SemanticErrorKind::AlreadyDeclared,
            Location::new("a.cn", 3),
            "name 'x' has already been declared",
        );
        assert_eq!(
            err.to_string(),
            "a.cn:3: AlreadyDeclared: name 'x' has already been declared"
        );
    }

    #[test]
    fn test_semantic_kind_passthrough() {
        let err: Error = SemanticError::new(
            SemanticErrorKind::UndefinedName,
            Location::default(),
            "nope",
        )
        .into();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::UndefinedName));
        assert_eq!(Error::Runtime("x".into()).semantic_kind(), None);
    }
}
