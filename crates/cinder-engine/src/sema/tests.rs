// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tests for the semantic analyzer.

use super::*;
use crate::ast::*;
use crate::error::{Location, SemanticError, SemanticErrorKind};
use crate::lexer::Span;
use crate::parser::Parser;

fn analyze(src: &str) -> Result<(Program, Module), SemanticError> {
    let program = Parser::with_unit(src, "test.cn").parse_program().unwrap();
    Analyzer::new("test.cn").analyze(program)
}

fn analyze_ok(src: &str) -> (Program, Module) {
    analyze(src).expect("Analysis should succeed")
}

fn error_kind(src: &str) -> SemanticErrorKind {
    analyze(src).unwrap_err().kind
}

fn class_method_return(program: &Program, method: usize) -> &Expression {
    let Some(Statement::ClassDeclaration(class)) = program
        .body
        .iter()
        .find(|stmt| matches!(stmt, Statement::ClassDeclaration(_)))
    else {
        panic!("no class in program");
    };
    let Some(Statement::Return(ReturnStatement {
        argument: Some(argument),
        ..
    })) = class.methods[method].body.body.last()
    else {
        panic!("method does not end in a return");
    };
    argument
}

#[test]
fn test_redeclaration_reports_second_line() {
    let err = analyze("int x;\nint x;").unwrap_err();
    assert_eq!(err.kind, SemanticErrorKind::AlreadyDeclared);
    assert_eq!(err.location, Location::new("test.cn", 2));
    assert!(err.message.contains("name 'x' has already been declared"));
}

#[test]
fn test_nested_redeclaration_is_shadowing() {
    analyze_ok("int x; while (x < 1) { int x; x = 2; } { int x; }");
}

#[test]
fn test_parameter_clash_with_body_local() {
    assert_eq!(
        error_kind("fn f(int a) { int a; }"),
        SemanticErrorKind::AlreadyDeclared
    );
}

#[test]
fn test_undefined_name() {
    assert_eq!(error_kind("print y;"), SemanticErrorKind::UndefinedName);
    assert_eq!(error_kind("print f(1);"), SemanticErrorKind::UndefinedName);
}

#[test]
fn test_initializer_becomes_assignment() {
    let (program, _) = analyze_ok("int x = 5;");
    assert_eq!(program.body.len(), 2);
    let Statement::VariableDeclaration(decl) = &program.body[0] else {
        panic!("expected declaration");
    };
    assert!(decl.init.is_none());
    assert!(decl.var.is_some());
    let Statement::Expression(stmt) = &program.body[1] else {
        panic!("expected assignment");
    };
    assert!(matches!(
        stmt.expression.kind,
        ExpressionKind::Binary {
            operator: BinaryOperator::Assign,
            ..
        }
    ));
}

#[test]
fn test_compound_assignment_desugars() {
    let (program, _) = analyze_ok("int x; x += 2;");
    let Statement::Expression(stmt) = &program.body[1] else {
        panic!("expected expression statement");
    };
    let ExpressionKind::Binary {
        operator, right, ..
    } = &stmt.expression.kind
    else {
        panic!("expected binary");
    };
    assert_eq!(*operator, BinaryOperator::Assign);
    assert!(matches!(
        right.kind,
        ExpressionKind::Binary {
            operator: BinaryOperator::Add,
            ..
        }
    ));
}

#[test]
fn test_binary_typing() {
    analyze_ok("int* p; int* q; p = q; print p == q;");
    assert_eq!(
        error_kind("int x; int* p; print x + p;"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("int a[2]; int b[2]; a = b;"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_comparison_yields_int() {
    let (program, _) = analyze_ok("int* p; int x; x = p < p;");
    let Statement::Expression(stmt) = &program.body[2] else {
        panic!("expected assignment");
    };
    assert_eq!(stmt.expression.ty, Some(Type::int()));
}

#[test]
fn test_aggregate_assignment_only() {
    analyze_ok("struct P { int x; int y; } P a; P b; a = b;");
    assert_eq!(
        error_kind("struct P { int x; } P a; P b; print a == b;"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("struct P { int x; } P a; P b; a + b;"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_aggregates_are_nominal() {
    assert_eq!(
        error_kind("struct A { int x; } struct B { int x; } A a; B b; a = b;"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_not_an_lvalue() {
    assert_eq!(error_kind("1 = 2;"), SemanticErrorKind::NotAnLvalue);
    assert_eq!(
        error_kind("int x; x + 1 = 2;"),
        SemanticErrorKind::NotAnLvalue
    );
}

#[test]
fn test_unary_rules() {
    analyze_ok("int x; int* p = &x; *p = -x; print +*p;");
    assert_eq!(
        error_kind("int x; print *x;"),
        SemanticErrorKind::InvalidDereference
    );
    assert_eq!(
        error_kind("int* p; p = &3;"),
        SemanticErrorKind::InvalidDereference
    );
    assert_eq!(
        error_kind("struct P { int x; } P p; print -p;"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_index_rules() {
    let (program, _) = analyze_ok("int a[3]; int* p; a[1] = p[2];");
    let Statement::Expression(stmt) = &program.body[2] else {
        panic!("expected assignment");
    };
    assert_eq!(stmt.expression.ty, Some(Type::int()));

    assert_eq!(
        error_kind("int x; x[0] = 1;"),
        SemanticErrorKind::NotSubscriptable
    );
    assert_eq!(
        error_kind("int a[3]; int* p; print a[p];"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_member_access_forms() {
    analyze_ok("class P { int x; } P p; p.x = 1; P* q = &p; print q->x;");
    assert_eq!(
        error_kind("class P { int x; } P p; p.x = 1; print p.x; print p->x;"),
        SemanticErrorKind::InvalidAccessForm
    );
    assert_eq!(
        error_kind("class P { int x; } P p; P* q = &p; print q.x;"),
        SemanticErrorKind::InvalidAccessForm
    );
    assert_eq!(
        error_kind("int x; print x.y;"),
        SemanticErrorKind::NotAnAggregate
    );
    assert_eq!(
        error_kind("int* x; print x->y;"),
        SemanticErrorKind::NotAnAggregate
    );
    assert_eq!(
        error_kind("class P { int x; } P p; print p.z;"),
        SemanticErrorKind::UndefinedName
    );
}

#[test]
fn test_array_member_decays() {
    let (program, _) = analyze_ok("struct S { int v[4]; } S s; s.v[2] = 7;");
    let Statement::Expression(stmt) = &program.body[2] else {
        panic!("expected assignment");
    };
    let ExpressionKind::Binary { left, .. } = &stmt.expression.kind else {
        panic!("expected binary");
    };
    let ExpressionKind::Index { object, .. } = &left.kind else {
        panic!("expected index");
    };
    assert_eq!(object.ty, Some(Type::pointer_to(Type::int())));
    assert!(matches!(
        object.kind,
        ExpressionKind::Unary {
            operator: UnaryOperator::AddressOf,
            ..
        }
    ));
}

#[test]
fn test_call_checks() {
    analyze_ok("fn add(int a, int b): int { return a + b; } print add(3, 4);");
    assert_eq!(
        error_kind("fn f(int a): int { return a; } print f(1, 2);"),
        SemanticErrorKind::ArityMismatch
    );
    assert_eq!(
        error_kind("fn f(int a): int { return a; } int* p; print f(p);"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("int f; f(1);"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_array_argument_decays() {
    let (program, module) = analyze_ok(
        "fn first(int a[3]): int { return a[0]; } int b[3]; print first(b);",
    );
    let Statement::FunctionDeclaration(func) = &program.body[0] else {
        panic!("expected function");
    };
    let function = module.func(func.function.unwrap());
    assert_eq!(
        module.var(function.params[0]).ty,
        Type::pointer_to(Type::int())
    );

    let Statement::Print(stmt) = &program.body[2] else {
        panic!("expected print");
    };
    let ExpressionKind::Call(call) = &stmt.argument.kind else {
        panic!("expected call");
    };
    assert!(matches!(
        call.arguments[0].kind,
        ExpressionKind::Unary {
            operator: UnaryOperator::AddressOf,
            ..
        }
    ));
}

#[test]
fn test_void_call_has_no_value() {
    analyze_ok("fn f() { } f();");
    assert_eq!(
        error_kind("fn f() { } int x = f();"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_return_rules() {
    assert_eq!(
        error_kind("fn f() { return 1; }"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("fn f(): int { return; }"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("int* p; fn f(): int { return p; }"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(error_kind("return 1;"), SemanticErrorKind::TypeMismatch);
}

#[test]
fn test_every_path_must_return() {
    assert_eq!(
        error_kind("fn g(): int { int z; }"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("fn g(int a): int { if (a < 1) { return 1; } }"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("fn g(int a): int { while (a < 1) { return 1; } }"),
        SemanticErrorKind::TypeMismatch
    );
    analyze_ok("fn g(int a): int { if (a < 1) { return 1; } else { return 2; } }");
    analyze_ok("fn g(): int { { return 1; } }");
    analyze_ok("fn g() { int z; }");
}

#[test]
fn test_print_and_conditions_need_words() {
    assert_eq!(
        error_kind("struct P { int x; } P p; print p;"),
        SemanticErrorKind::TypeMismatch
    );
    assert_eq!(
        error_kind("int a[2]; while (a) { }"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_storage_classes() {
    let (program, module) = analyze_ok("int x; fn f() { int y; }");
    let Statement::VariableDeclaration(x) = &program.body[0] else {
        panic!("expected declaration");
    };
    assert_eq!(module.var(x.var.unwrap()).storage, Storage::Main);

    let Statement::FunctionDeclaration(func) = &program.body[1] else {
        panic!("expected function");
    };
    let Statement::VariableDeclaration(y) = &func.body.body[0] else {
        panic!("expected declaration");
    };
    assert_eq!(module.var(y.var.unwrap()).storage, Storage::Local);
}

#[test]
fn test_other_frames_are_invisible() {
    assert_eq!(
        error_kind("fn outer() { int a; fn inner(): int { return a; } }"),
        SemanticErrorKind::UndefinedName
    );
    // Entry-frame variables are addressed absolutely and stay visible.
    analyze_ok("int g; fn read(): int { return g; }");
}

#[test]
fn test_implicit_receiver() {
    let (program, _) = analyze_ok("class C { int v; fn get(): int { return v; } }");
    let argument = class_method_return(&program, 0);
    let ExpressionKind::Member {
        object, indirect, ..
    } = &argument.kind
    else {
        panic!("expected member access, got {:?}", argument.kind);
    };
    assert!(*indirect);
    assert!(matches!(object.kind, ExpressionKind::Receiver(Some(_))));
}

#[test]
fn test_method_calls_pass_receiver() {
    let (program, module) = analyze_ok(
        "class C { int v; fn get(): int { return v; } fn twice(): int { return get() + this->get(); } }\n\
         C c; print c.get();",
    );

    let argument = class_method_return(&program, 1);
    let ExpressionKind::Binary { left, .. } = &argument.kind else {
        panic!("expected binary");
    };
    let ExpressionKind::Call(call) = &left.kind else {
        panic!("expected call");
    };
    assert!(matches!(
        call.receiver.as_deref().map(|r| &r.kind),
        Some(ExpressionKind::Receiver(Some(_)))
    ));

    let Some(Statement::Print(stmt)) = program.body.last() else {
        panic!("expected print");
    };
    let ExpressionKind::Call(call) = &stmt.argument.kind else {
        panic!("expected call");
    };
    let receiver = call.receiver.as_deref().unwrap();
    assert!(matches!(
        receiver.kind,
        ExpressionKind::Unary {
            operator: UnaryOperator::AddressOf,
            ..
        }
    ));
    let method = module.func(call.function.unwrap());
    assert_eq!(method.name, "get");
    assert!(method.owner.is_some());
}

#[test]
fn test_methods_declared_before_bodies() {
    analyze_ok("class C { fn a(): int { return b(); } fn b(): int { return 1; } }");
}

#[test]
fn test_method_on_temporary() {
    assert_eq!(
        error_kind(
            "struct P { int x; fn get(): int { return x; } } P g; fn make(): P { return g; } print make().get();"
        ),
        SemanticErrorKind::NotAnLvalue
    );
}

const MAKES_P: &str = "struct P { int x; int y; int a[2]; } P g; fn mk(): P { return g; } ";

#[test]
fn test_member_of_temporary() {
    analyze_ok(&format!("{MAKES_P}P p; p = mk(); print p.y;"));
    for tail in [
        "print mk().y;",
        "mk().y = 1;",
        "int* q; q = &mk().y;",
        "int* q; q = mk().a;",
    ] {
        assert_eq!(
            error_kind(&format!("{MAKES_P}{tail}")),
            SemanticErrorKind::NotAnLvalue,
            "for {:?}",
            tail
        );
    }
}

#[test]
fn test_index_of_temporary_array() {
    analyze_ok("int g[3]; int* p; fn f(): int* { return p; } p = &g[0]; print f()[0];");
    assert_eq!(
        error_kind("int g[3]; fn f(): int[3] { return g; } print f()[0];"),
        SemanticErrorKind::NotAnLvalue
    );
}

#[test]
fn test_this_outside_method() {
    assert_eq!(error_kind("print this;"), SemanticErrorKind::UndefinedName);
}

#[test]
fn test_self_referential_members() {
    analyze_ok("class Node { int value; Node* next; }");
    assert_eq!(
        error_kind("class Node { int value; Node inner; }"),
        SemanticErrorKind::TypeMismatch
    );
}

#[test]
fn test_scope_tree_shape() {
    let (program, module) = analyze_ok("int x; { int y; } fn f() { if (1) { int z; } }");
    let root = program.scope.unwrap();
    assert_eq!(root, module.root());
    let children = &module.scope(root).children;
    assert_eq!(children.len(), 2);
    assert_eq!(module.scope(children[0]).kind, ScopeKind::Block);
    assert_eq!(module.scope(children[1]).kind, ScopeKind::Function);
    assert!(module.scope(children[1]).function.is_some());
}

#[test]
fn test_hand_built_tree() {
    let span = Span::at_line(1);
    let program = Program::new(vec![
        Statement::VariableDeclaration(VariableDeclaration {
            ty: TypeExpr::Int(span),
            name: Identifier::new("x", span),
            init: Some(Expression::constant(2, span)),
            var: None,
        }),
        Statement::Print(PrintStatement {
            argument: Expression::binary(
                BinaryOperator::Mul,
                Expression::identifier("x", span),
                Expression::constant(3, span),
            ),
            span,
        }),
    ]);

    let (program, _) = Analyzer::new("hand").analyze(program).unwrap();
    assert_eq!(program.body.len(), 3);
    let Statement::Print(stmt) = &program.body[2] else {
        panic!("expected print");
    };
    assert_eq!(stmt.argument.ty, Some(Type::int()));
}
