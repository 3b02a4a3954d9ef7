// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Whole-pipeline tests: source text in, printed values out.

use cinder_engine::{Engine, EngineConfig, Error, SemanticErrorKind, VmConfig, Word};

fn engine() -> Engine {
    Engine::with_config(EngineConfig {
        unit: "e2e.cn".into(),
        vm: VmConfig::quiet(),
    })
}

fn run(source: &str) -> Vec<Word> {
    let mut engine = engine();
    let printed = engine.eval(source).expect("Program should run");
    assert_balanced(&engine);
    printed
}

fn compile_error(source: &str) -> Error {
    engine()
        .compile(source)
        .expect_err("Compilation should fail")
}

fn assert_balanced(engine: &Engine) {
    let vm = engine.vm();
    assert_eq!(vm.stack_pointer(), 0, "value stack not unwound");
    assert_eq!(vm.frame_pointer(), 0, "frame pointer not restored");
    assert_eq!(vm.frame_depth(), 0, "frames left open");
    assert_eq!(vm.call_depth(), 0, "return addresses left behind");
    assert_eq!(vm.pending_arguments(), 0, "arguments left in flight");
}

// ============================================================================
// Core scenarios
// ============================================================================

#[test]
fn test_precedence() {
    assert_eq!(run("int x = 2; int y = 3; print x + y * 2;"), vec![8]);
}

#[test]
fn test_function_call() {
    assert_eq!(
        run("fn add(int a, int b): int { return a + b; } print add(3,4);"),
        vec![7]
    );
}

#[test]
fn test_array_loop() {
    let source = "int a[3]; a[0]=1; a[1]=2; a[2]=3; int i=0; \
                  while (i<3) { print a[i]; i = i+1; }";
    assert_eq!(run(source), vec![1, 2, 3]);
}

#[test]
fn test_redeclaration_names_second_line() {
    let err = compile_error("int x;\nint x;\n");
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::AlreadyDeclared));
    match err {
        Error::Semantic(err) => {
            assert_eq!(err.location.unit, "e2e.cn");
            assert_eq!(err.location.line, 2);
        }
        other => panic!("Expected a semantic error, got {:?}", other),
    }
}

#[test]
fn test_member_access_forms() {
    let value = "class P { int x; } P p; p.x = 5; print p.x;";
    assert_eq!(run(value), vec![5]);

    let arrow = "class P { int x; } P p; p.x = 5; print p->x;";
    assert_eq!(
        compile_error(arrow).semantic_kind(),
        Some(SemanticErrorKind::InvalidAccessForm)
    );
}

// ============================================================================
// Language features
// ============================================================================

#[test]
fn test_recursion() {
    let source = "fn fact(int n): int { if (n <= 1) { return 1; } return n * fact(n - 1); } \
                  print fact(5);";
    assert_eq!(run(source), vec![120]);
}

#[test]
fn test_mutual_recursion_through_globals() {
    let source = "int calls; \
                  fn fib(int n): int { calls = calls + 1; if (n < 2) { return n; } \
                  return fib(n - 1) + fib(n - 2); } \
                  print fib(10); print calls;";
    assert_eq!(run(source), vec![55, 177]);
}

#[test]
fn test_pointers() {
    let source = "int x; int* p; p = &x; *p = 41; x = x + 1; print *p;";
    assert_eq!(run(source), vec![42]);
}

#[test]
fn test_pointer_parameter_writes_through() {
    let source = "fn set(int* p, int v) { *p = v; } int x; set(&x, 9); print x;";
    assert_eq!(run(source), vec![9]);
}

#[test]
fn test_array_argument_decays_to_pointer() {
    let source = "fn sum(int* p, int n): int { int s = 0; int i; \
                  for (i = 0; i < n; i = i + 1) { s = s + p[i]; } return s; } \
                  int a[4]; a[0] = 1; a[1] = 2; a[2] = 3; a[3] = 4; print sum(a, 4);";
    assert_eq!(run(source), vec![10]);
}

#[test]
fn test_struct_copy_is_by_value() {
    let source = "struct P { int x; int y; } P a; P b; \
                  a.x = 1; a.y = 2; b = a; a.x = 10; print b.x; print b.y; print a.x;";
    assert_eq!(run(source), vec![1, 2, 10]);
}

#[test]
fn test_struct_through_pointer() {
    let source = "struct P { int x; int y; } P p; P* q; q = &p; q->y = 6; p.x = q->y * 2; \
                  print p.x; print q->y;";
    assert_eq!(run(source), vec![12, 6]);
}

#[test]
fn test_methods_see_receiver() {
    let source = "class Counter { int n; fn bump(int by) { n = n + by; } fn get(): int { return n; } } \
                  Counter c; c.bump(3); c.bump(4); print c.get(); print c.n;";
    assert_eq!(run(source), vec![7, 7]);
}

#[test]
fn test_method_through_pointer() {
    let source = "class Box { int v; fn put(int x) { v = x; } } \
                  Box b; Box* p = &b; p->put(11); print b.v;";
    assert_eq!(run(source), vec![11]);
}

#[test]
fn test_comparisons_as_values() {
    let source = "int a = 3; int b = 4; \
                  print a < b; print a > b; print a == 3; print a != 3; print b >= 4; print b <= 3;";
    assert_eq!(run(source), vec![1, 0, 1, 0, 1, 0]);
}

#[test]
fn test_if_else_chain() {
    let source = "fn sign(int x): int { if (x < 0) { return -1; } else if (x == 0) { return 0; } \
                  else { return 1; } } print sign(-5); print sign(0); print sign(8);";
    assert_eq!(run(source), vec![-1, 0, 1]);
}

#[test]
fn test_for_loop() {
    assert_eq!(
        run("for (int i = 0; i < 3; i += 1) print i * i;"),
        vec![0, 1, 4]
    );
}

#[test]
fn test_nested_scopes_shadow() {
    let source = "int x = 1; { int x = 2; print x; } print x;";
    assert_eq!(run(source), vec![2, 1]);
}

#[test]
fn test_division_truncates() {
    assert_eq!(run("print 7 / 2; print -7 / 2;"), vec![3, -3]);
}

#[test]
fn test_chained_assignment() {
    assert_eq!(run("int a; int b; a = b = 4; print a + b;"), vec![8]);
}

#[test]
fn test_discarded_call_result() {
    let source = "int hits; fn touch(): int { hits = hits + 1; return hits; } \
                  touch(); touch(); print hits;";
    assert_eq!(run(source), vec![2]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_division_by_zero_is_runtime_error() {
    let err = engine().eval("int z; print 1 / z;").unwrap_err();
    assert!(matches!(err, Error::Runtime(_)));
}

#[test]
fn test_syntax_error_names_line() {
    let err = compile_error("int x;\nprint x\n");
    assert!(matches!(err, Error::Syntax { .. }));
    assert!(err.to_string().starts_with("e2e.cn:"));
}

#[test]
fn test_semantic_error_kinds() {
    let cases = [
        ("print y;", SemanticErrorKind::UndefinedName),
        ("nothing();", SemanticErrorKind::UndefinedName),
        ("int* p; int x; x = p;", SemanticErrorKind::TypeMismatch),
        ("int x; print x[0];", SemanticErrorKind::NotSubscriptable),
        ("int x; print x.y;", SemanticErrorKind::NotAnAggregate),
        ("fn f(int a) { } f(1, 2);", SemanticErrorKind::ArityMismatch),
        ("int x; print *x;", SemanticErrorKind::InvalidDereference),
        ("1 = 2;", SemanticErrorKind::NotAnLvalue),
    ];
    for (source, kind) in cases {
        assert_eq!(
            compile_error(source).semantic_kind(),
            Some(kind),
            "for {:?}",
            source
        );
    }
}

#[test]
fn test_temporary_aggregates_are_rejected_before_codegen() {
    let prelude = "struct P { int x; int y; } P g; fn mk(): P { g.y = 3; return g; } ";
    assert_eq!(run(&format!("{prelude}P p; p = mk(); print p.y;")), vec![3]);

    for tail in ["print mk().y;", "mk().x = 1;"] {
        let err = compile_error(&format!("{prelude}{tail}"));
        assert_eq!(
            err.semantic_kind(),
            Some(SemanticErrorKind::NotAnLvalue),
            "for {:?}: {}",
            tail,
            err
        );
    }
}

#[test]
fn test_missing_return_is_compile_error() {
    let err = compile_error("fn g(): int { int z; } print g();");
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::TypeMismatch));
}

// ============================================================================
// Listings
// ============================================================================

#[test]
fn test_listing_runs_like_source() {
    let source = "fn sq(int x): int { return x * x; } int i; \
                  while (i < 4) { print sq(i); i = i + 1; }";
    let mut engine = engine();
    let bytecode = engine.compile(source).unwrap();
    let direct = engine.run_bytecode(&bytecode).unwrap();
    let listed = engine.run_listing(&bytecode.to_string()).unwrap();
    assert_eq!(direct, vec![0, 1, 4, 9]);
    assert_eq!(listed, direct);
    assert_balanced(&engine);
}
