// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # cinder-engine
//!
//! Compiler back half and virtual machine for Cinder, a small imperative
//! language with pointers, fixed-size arrays and classes.
//!
//! ## Overview
//!
//! The pipeline, leaves first:
//! - `lexer` and `parser`: source text to an unannotated [`ast::Program`]
//! - `sema`: name resolution, type checking and desugaring
//! - `layout`: byte offsets, aggregate sizes and frame sizes
//! - `compiler`: bytecode generation with stack-depth accounting
//! - `vm`: a stack machine that runs the bytecode
//!
//! Every stage after the parser accepts hand-built trees.
//!
//! ## Quick Start
//!
//! ```rust
//! use cinder_engine::{Engine, EngineConfig, VmConfig};
//!
//! let mut engine = Engine::with_config(EngineConfig {
//!     vm: VmConfig::quiet(),
//!     ..EngineConfig::default()
//! });
//! let printed = engine.eval("int x = 5; int y = 3; print x + y;").unwrap();
//! assert_eq!(printed, vec![8]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod sema;
pub mod vm;

#[cfg(any(feature = "async", feature = "parallel"))]
mod async_engine;

use std::path::Path;

use tracing::debug;

pub use compiler::{Bytecode, Word};
pub use config::{EngineConfig, VmConfig};
pub use error::{Error, Location, Result, SemanticError, SemanticErrorKind};
pub use vm::VM;

#[cfg(feature = "async")]
pub use async_engine::AsyncEngine;
#[cfg(feature = "parallel")]
pub use async_engine::ParallelExecutor;

use ast::Program;
use compiler::Compiler;
use parser::Parser;
use sema::Analyzer;

/// Parses `source`, naming `unit` in diagnostics.
pub fn parse(source: &str, unit: &str) -> Result<Program> {
    Parser::with_unit(source, unit).parse_program()
}

/// Analyzes, lays out and compiles an unannotated tree.
pub fn compile_program(program: Program, unit: &str) -> Result<Bytecode> {
    let (program, mut module) = Analyzer::new(unit).analyze(program)?;
    layout::allocate(&mut module)?;
    let bytecode = Compiler::new(&module).compile(&program)?;
    debug!(unit, instructions = bytecode.instructions.len(), "compiled");
    Ok(bytecode)
}

/// Compiles source text to bytecode.
pub fn compile(source: &str, unit: &str) -> Result<Bytecode> {
    compile_program(parse(source, unit)?, unit)
}

/// The main Cinder engine instance.
///
/// Owns a [`VM`] and runs the whole pipeline on each call.
pub struct Engine {
    config: EngineConfig,
    vm: VM,
}

impl Engine {
    /// Creates a new engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let vm = VM::new(config.vm.clone());
        Self { config, vm }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The VM of the last run, for inspection.
    pub fn vm(&self) -> &VM {
        &self.vm
    }

    /// Compiles source text under the configured unit name.
    pub fn compile(&self, source: &str) -> Result<Bytecode> {
        compile(source, &self.config.unit)
    }

    /// Compiles and runs source text, returning the printed values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use cinder_engine::{Engine, EngineConfig, VmConfig};
    /// let mut engine = Engine::with_config(EngineConfig {
    ///     vm: VmConfig::quiet(),
    ///     ..EngineConfig::default()
    /// });
    /// assert_eq!(engine.eval("print 2 * 3 + 1;").unwrap(), vec![7]);
    /// ```
    pub fn eval(&mut self, source: &str) -> Result<Vec<Word>> {
        let bytecode = self.compile(source)?;
        self.run_bytecode(&bytecode)
    }

    /// Runs already compiled bytecode.
    pub fn run_bytecode(&mut self, bytecode: &Bytecode) -> Result<Vec<Word>> {
        self.vm.execute(bytecode)
    }

    /// Compiles and runs a source file, naming it in diagnostics.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<Word>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        let bytecode = compile(&source, &path.display().to_string())?;
        self.run_bytecode(&bytecode)
    }

    /// Parses and runs a textual listing.
    pub fn run_listing(&mut self, listing: &str) -> Result<Vec<Word>> {
        let bytecode = Bytecode::parse(listing)?;
        self.run_bytecode(&bytecode)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
