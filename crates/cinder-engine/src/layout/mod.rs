// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Frame layout.
//!
//! Assigns a byte offset to every member and variable, and computes aggregate
//! sizes and frame sizes. Runs once, after analysis, mutating the [`Module`]
//! in place.
//!
//! - Aggregates are laid out first, in declaration order, members packed
//!   from offset 0.
//! - Entry-frame and function variables are packed from the start of their
//!   frame. A block continues from its parent's running offset, so sibling
//!   blocks reuse the same range and the frame size is the deepest extent.
//! - Function bodies restart at 0 and record their extent as the frame size.

use tracing::debug;

use crate::error::{Error, Result};
use crate::sema::{AggregateId, Module, ScopeId, ScopeKind, Storage};

/// Lays out every aggregate, variable and frame in `module`.
pub fn allocate(module: &mut Module) -> Result<()> {
    layout_aggregates(module)?;

    let root = module.root();
    let main_frame = layout_scope(module, root, 0)?;
    module.main_frame_size = Some(main_frame);

    debug!(main_frame, "layout complete");
    Ok(())
}

fn layout_aggregates(module: &mut Module) -> Result<()> {
    for index in 0..module.aggregate_count() {
        let id = AggregateId(index);
        let members = module.aggregate(id).members.clone();

        let mut offset = 0u32;
        for member in members {
            let size = module.size_of(&module.var(member).ty).ok_or_else(|| {
                Error::Internal(format!(
                    "member '{}' of '{}' has no size",
                    module.var(member).name,
                    module.aggregate(id).name
                ))
            })?;
            module.var_mut(member).offset = Some(offset);
            offset = grow(offset, size)?;
        }

        module.aggregate_mut(id).size = Some(offset);
    }
    Ok(())
}

/// Lays out `scope` starting at `base` and returns the extent it reaches.
fn layout_scope(module: &mut Module, scope: ScopeId, base: u32) -> Result<u32> {
    let mut offset = base;
    for var in module.scope(scope).variables.clone() {
        if let Storage::Member(_) = module.var(var).storage {
            continue;
        }
        let size = module.size_of(&module.var(var).ty).ok_or_else(|| {
            Error::Internal(format!("variable '{}' has no size", module.var(var).name))
        })?;
        module.var_mut(var).offset = Some(offset);
        offset = grow(offset, size)?;
    }

    let mut extent = offset;
    for child in module.scope(scope).children.clone() {
        match module.scope(child).kind {
            ScopeKind::Block => {
                extent = extent.max(layout_scope(module, child, offset)?);
            }
            ScopeKind::Function => {
                let frame = layout_scope(module, child, 0)?;
                let function = module.scope(child).function.ok_or_else(|| {
                    Error::Internal("function scope without a function".to_string())
                })?;
                module.func_mut(function).frame_size = Some(frame);
            }
            ScopeKind::Aggregate => {
                // Members were placed above; only the methods need frames.
                layout_scope(module, child, 0)?;
            }
            ScopeKind::Root => {
                return Err(Error::Internal("nested root scope".to_string()));
            }
        }
    }

    module.scope_mut(scope).frame_size = extent;
    Ok(extent)
}

fn grow(offset: u32, size: u32) -> Result<u32> {
    offset
        .checked_add(size)
        .ok_or_else(|| Error::Internal("frame exceeds the address space".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Program, Statement};
    use crate::parser::Parser;
    use crate::sema::{
        AggregateDecl, Analyzer, FuncId, Type, VarDecl, VarId,
    };

    fn laid_out(src: &str) -> (Program, Module) {
        let program = Parser::new(src).parse_program().unwrap();
        let (program, mut module) = Analyzer::new("test").analyze(program).unwrap();
        allocate(&mut module).unwrap();
        (program, module)
    }

    fn offset_of(module: &Module, var: VarId) -> u32 {
        module.var(var).offset.unwrap()
    }

    fn declared(program: &Program) -> Vec<VarId> {
        fn walk(body: &[Statement], out: &mut Vec<VarId>) {
            for stmt in body {
                match stmt {
                    Statement::VariableDeclaration(decl) => out.push(decl.var.unwrap()),
                    Statement::Block(block) => walk(&block.body, out),
                    Statement::FunctionDeclaration(func) => walk(&func.body.body, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&program.body, &mut out);
        out
    }

    #[test]
    fn test_entry_frame_packing() {
        let (program, module) = laid_out("int x; int a[3]; int* p;");
        let vars = declared(&program);
        assert_eq!(offset_of(&module, vars[0]), 0);
        assert_eq!(offset_of(&module, vars[1]), 4);
        assert_eq!(offset_of(&module, vars[2]), 16);
        assert_eq!(module.main_frame_size, Some(20));
    }

    #[test]
    fn test_sibling_blocks_share_range() {
        let (program, module) = laid_out("int x; { int y; } { int z; int w; }");
        let vars = declared(&program);
        assert_eq!(offset_of(&module, vars[0]), 0);
        assert_eq!(offset_of(&module, vars[1]), 4);
        assert_eq!(offset_of(&module, vars[2]), 4);
        assert_eq!(offset_of(&module, vars[3]), 8);
        assert_eq!(module.main_frame_size, Some(12));
    }

    #[test]
    fn test_aggregate_layout() {
        let (_, module) = laid_out("struct P { int x; int a[2]; P* next; } P p;");
        let id = AggregateId(0);
        let members = &module.aggregate(id).members;
        let offsets: Vec<u32> = members.iter().map(|m| offset_of(&module, *m)).collect();
        assert_eq!(offsets, vec![0, 4, 12]);
        assert_eq!(module.aggregate(id).size, Some(16));
        assert_eq!(module.main_frame_size, Some(16));
    }

    #[test]
    fn test_nested_aggregate_size() {
        let (_, module) = laid_out("struct A { int x; int y; } struct B { int z; A a; } B b[2];");
        assert_eq!(module.aggregate(AggregateId(1)).size, Some(12));
        assert_eq!(module.size_of(&Type::Aggregate(AggregateId(1))), Some(12));
        assert_eq!(module.main_frame_size, Some(24));
    }

    #[test]
    fn test_function_frame() {
        let (program, module) =
            laid_out("int g; fn f(int a, int b): int { int c; { int d; } return a; }");
        let func = module.func(FuncId(0));
        assert_eq!(offset_of(&module, func.params[0]), 0);
        assert_eq!(offset_of(&module, func.params[1]), 4);
        let vars = declared(&program);
        // g, c, d
        assert_eq!(offset_of(&module, vars[1]), 8);
        assert_eq!(offset_of(&module, vars[2]), 12);
        assert_eq!(func.frame_size, Some(16));
        assert_eq!(module.main_frame_size, Some(4));
    }

    #[test]
    fn test_method_frame_includes_receiver() {
        let (_, module) = laid_out("class C { int v; fn get(): int { int t; return v; } }");
        let method = module.func(FuncId(0));
        assert_eq!(offset_of(&module, method.receiver.unwrap()), 0);
        assert_eq!(method.frame_size, Some(8));
        assert_eq!(module.aggregate(AggregateId(0)).size, Some(4));
        assert_eq!(module.main_frame_size, Some(0));
    }

    #[test]
    fn test_unsized_member_is_internal_error() {
        let mut module = Module::new();
        let root = module.root();
        let declare = |module: &mut Module, name: &str| {
            let scope = module.create_scope(root, ScopeKind::Aggregate);
            module
                .declare_aggregate(
                    root,
                    AggregateDecl {
                        name: name.into(),
                        members: Vec::new(),
                        methods: Vec::new(),
                        scope,
                        size: None,
                        complete: true,
                        line: 1,
                    },
                )
                .unwrap()
        };
        let first = declare(&mut module, "First");
        let second = declare(&mut module, "Second");
        let scope = module.aggregate(first).scope;
        // A by-value member of an aggregate laid out later cannot be sized.
        let member = module
            .declare_variable(VarDecl {
                name: "inner".into(),
                ty: Type::Aggregate(second),
                line: 1,
                storage: Storage::Member(first),
                offset: None,
                scope,
            })
            .unwrap();
        module.aggregate_mut(first).members.push(member);

        assert!(matches!(allocate(&mut module), Err(Error::Internal(_))));
    }
}
