// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The lexical scope tree and declaration arenas.
//!
//! Every scope, variable, function and aggregate lives in a flat `Vec` inside
//! [`Module`] and is addressed by index. Parent and child links are plain
//! ids, so the layout pass can mutate offsets in place after analysis.

use rustc_hash::FxHashMap;

use super::types::{AggregateId, FuncId, ScopeId, Type, VarId, WORD_SIZE};
use crate::error::SemanticErrorKind;

/// What introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Top-level program scope
    Root,
    /// A `{ ... }` block or loop header
    Block,
    /// A function or method body
    Function,
    /// The member scope of a class or struct
    Aggregate,
}

/// What a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A variable, parameter, receiver or member
    Variable(VarId),
    /// A function or method
    Function(FuncId),
}

/// Where a variable lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Part of the entry frame, addressed absolutely
    Main,
    /// Part of a function frame, addressed from the frame pointer
    Local,
    /// A field of an aggregate, addressed from its object
    Member(AggregateId),
}

/// A node in the scope tree.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Enclosing scope, `None` only for the root
    pub parent: Option<ScopeId>,
    /// Nested scopes in creation order
    pub children: Vec<ScopeId>,
    /// What introduced this scope
    pub kind: ScopeKind,
    /// Variables and functions declared directly here
    pub bindings: FxHashMap<String, Binding>,
    /// Variables declared directly here, in declaration order
    pub variables: Vec<VarId>,
    /// Aggregates declared directly here
    pub aggregates: FxHashMap<String, AggregateId>,
    /// Return type of the enclosing function
    pub return_type: Option<Type>,
    /// Enclosing function, if any
    pub function: Option<FuncId>,
    /// Enclosing aggregate, if any
    pub aggregate: Option<AggregateId>,
    /// Bytes occupied by this scope and its deepest nested block
    pub frame_size: u32,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            children: Vec::new(),
            kind,
            bindings: FxHashMap::default(),
            variables: Vec::new(),
            aggregates: FxHashMap::default(),
            return_type: None,
            function: None,
            aggregate: None,
            frame_size: 0,
        }
    }
}

/// A declared variable, parameter, receiver or member.
#[derive(Debug, Clone)]
pub struct VarDecl {
    /// Declared name
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// Line of the declaration
    pub line: u32,
    /// Storage class
    pub storage: Storage,
    /// Byte offset, assigned by layout
    pub offset: Option<u32>,
    /// Declaring scope
    pub scope: ScopeId,
}

/// A declared function or method.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    /// Declared name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<VarId>,
    /// Declared return type, `None` for procedures
    pub return_type: Option<Type>,
    /// Body scope
    pub scope: ScopeId,
    /// Owning aggregate, for methods
    pub owner: Option<AggregateId>,
    /// The implicit `this` parameter, for methods
    pub receiver: Option<VarId>,
    /// Frame size in bytes, assigned by layout
    pub frame_size: Option<u32>,
    /// Line of the declaration
    pub line: u32,
}

/// A declared struct or class.
#[derive(Debug, Clone)]
pub struct AggregateDecl {
    /// Declared name
    pub name: String,
    /// Members in declaration order
    pub members: Vec<VarId>,
    /// Methods in declaration order
    pub methods: Vec<FuncId>,
    /// Member scope
    pub scope: ScopeId,
    /// Total size in bytes, assigned by layout
    pub size: Option<u32>,
    /// Set once every member has been declared
    pub complete: bool,
    /// Line of the declaration
    pub line: u32,
}

/// The analyzed program's declarations.
#[derive(Debug, Clone)]
pub struct Module {
    scopes: Vec<Scope>,
    vars: Vec<VarDecl>,
    funcs: Vec<FuncDecl>,
    aggregates: Vec<AggregateDecl>,
    /// Size of the entry frame, assigned by layout
    pub main_frame_size: Option<u32>,
}

impl Module {
    /// Creates a module holding only the root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, ScopeKind::Root)],
            vars: Vec::new(),
            funcs: Vec::new(),
            aggregates: Vec::new(),
            main_frame_size: None,
        }
    }

    /// The root scope.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Creates a child scope and registers it with its parent.
    ///
    /// Blocks inherit the parent's function, return type and aggregate.
    /// Function and aggregate scopes chain to the parent for lookup only.
    pub fn create_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let mut scope = Scope::new(Some(parent), kind);
        if kind == ScopeKind::Block {
            let outer = &self.scopes[parent.0];
            scope.return_type = outer.return_type.clone();
            scope.function = outer.function;
            scope.aggregate = outer.aggregate;
        }
        self.scopes.push(scope);
        self.scopes[parent.0].children.push(id);
        id
    }

    /// Binds `name` in `scope`.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        binding: Binding,
    ) -> Result<(), SemanticErrorKind> {
        let bindings = &mut self.scopes[scope.0].bindings;
        if bindings.contains_key(name) {
            return Err(SemanticErrorKind::AlreadyDeclared);
        }
        bindings.insert(name.to_string(), binding);
        Ok(())
    }

    /// Adds a variable to the arena and binds it in its scope.
    pub fn declare_variable(&mut self, decl: VarDecl) -> Result<VarId, SemanticErrorKind> {
        let id = VarId(self.vars.len());
        let scope = decl.scope;
        self.declare(scope, &decl.name, Binding::Variable(id))?;
        self.scopes[scope.0].variables.push(id);
        self.vars.push(decl);
        Ok(id)
    }

    /// Adds a function to the arena and binds it in `scope`.
    pub fn declare_function(
        &mut self,
        scope: ScopeId,
        decl: FuncDecl,
    ) -> Result<FuncId, SemanticErrorKind> {
        let id = FuncId(self.funcs.len());
        self.declare(scope, &decl.name, Binding::Function(id))?;
        self.funcs.push(decl);
        Ok(id)
    }

    /// Adds an aggregate to the arena and registers its name in `scope`.
    pub fn declare_aggregate(
        &mut self,
        scope: ScopeId,
        decl: AggregateDecl,
    ) -> Result<AggregateId, SemanticErrorKind> {
        let id = AggregateId(self.aggregates.len());
        let names = &mut self.scopes[scope.0].aggregates;
        if names.contains_key(&decl.name) {
            return Err(SemanticErrorKind::AlreadyDeclared);
        }
        names.insert(decl.name.clone(), id);
        self.aggregates.push(decl);
        Ok(id)
    }

    /// Resolves `name` from `scope` outward, returning the declaring scope.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, Binding)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(binding) = scope.bindings.get(name) {
                return Some((id, *binding));
            }
            current = scope.parent;
        }
        None
    }

    /// Resolves an aggregate name from `scope` outward.
    pub fn lookup_aggregate(&self, scope: ScopeId, name: &str) -> Option<AggregateId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(aggregate) = scope.aggregates.get(name) {
                return Some(*aggregate);
            }
            current = scope.parent;
        }
        None
    }

    /// Finds a member of an aggregate by name.
    pub fn member(&self, aggregate: AggregateId, name: &str) -> Option<VarId> {
        self.aggregates[aggregate.0]
            .members
            .iter()
            .copied()
            .find(|id| self.vars[id.0].name == name)
    }

    /// Finds a method of an aggregate by name.
    pub fn method(&self, aggregate: AggregateId, name: &str) -> Option<FuncId> {
        self.aggregates[aggregate.0]
            .methods
            .iter()
            .copied()
            .find(|id| self.funcs[id.0].name == name)
    }

    /// Size of a type in bytes, `None` while an aggregate is unsized.
    pub fn size_of(&self, ty: &Type) -> Option<u32> {
        match ty {
            Type::Primitive(_) | Type::Pointer(_) => Some(WORD_SIZE),
            Type::Array(element, count) => self.size_of(element)?.checked_mul(*count),
            Type::Aggregate(id) => self.aggregates[id.0].size,
        }
    }

    /// Renders a type the way it is written in source.
    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Primitive(_) => "int".to_string(),
            Type::Pointer(base) => format!("{}*", self.type_name(base)),
            Type::Array(element, count) => format!("{}[{}]", self.type_name(element), count),
            Type::Aggregate(id) => self.aggregates[id.0].name.clone(),
        }
    }

    /// Returns a scope.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Returns a scope for mutation.
    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    /// Returns a variable.
    pub fn var(&self, id: VarId) -> &VarDecl {
        &self.vars[id.0]
    }

    /// Returns a variable for mutation.
    pub fn var_mut(&mut self, id: VarId) -> &mut VarDecl {
        &mut self.vars[id.0]
    }

    /// Returns a function.
    pub fn func(&self, id: FuncId) -> &FuncDecl {
        &self.funcs[id.0]
    }

    /// Returns a function for mutation.
    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncDecl {
        &mut self.funcs[id.0]
    }

    /// Returns an aggregate.
    pub fn aggregate(&self, id: AggregateId) -> &AggregateDecl {
        &self.aggregates[id.0]
    }

    /// Returns an aggregate for mutation.
    pub fn aggregate_mut(&mut self, id: AggregateId) -> &mut AggregateDecl {
        &mut self.aggregates[id.0]
    }

    /// Number of aggregates, in declaration order.
    pub fn aggregate_count(&self) -> usize {
        self.aggregates.len()
    }

    /// Number of functions, in declaration order.
    pub fn function_count(&self) -> usize {
        self.funcs.len()
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}
