// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Parser for Cinder source code.
//!
//! Transforms a stream of tokens into an unannotated Abstract Syntax Tree.
//!
//! ## Structure
//!
//! - `parser` - The `Parser` struct, declarations, statements and types
//! - `expressions` - Expression parsing (operators, postfix forms, calls)
//!
//! A name only starts a declaration once a `class` or `struct` of that name
//! has been seen, so `Point p;` must follow `class Point { ... }`.
//!
//! ## Usage
//!
//! ```rust
//! use cinder_engine::parser::Parser;
//!
//! let mut parser = Parser::new("int x = 1 + 2;");
//! let program = parser.parse_program().expect("Should parse");
//! assert_eq!(program.body.len(), 1);
//! ```

mod expressions;
#[allow(clippy::module_inception)]
mod parser;

pub use parser::Parser;
