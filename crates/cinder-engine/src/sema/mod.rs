// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Semantic analysis.
//!
//! # Module Structure
//!
//! - `types`: the type vocabulary and arena handles
//! - `scope`: the scope tree and declaration arenas (`Module`)
//! - `analyzer`: name resolution, type checking and desugaring

pub mod analyzer;
pub mod scope;
pub mod types;

#[cfg(test)]
mod tests;

pub use analyzer::Analyzer;
pub use scope::{
    AggregateDecl, Binding, FuncDecl, Module, Scope, ScopeKind, Storage, VarDecl,
};
pub use types::{AggregateId, FuncId, Primitive, ScopeId, Type, VarId, WORD_SIZE};
