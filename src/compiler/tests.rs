use pretty_assertions::assert_eq;

use super::*;
use crate::error::{CompileError, SemanticError};
use crate::symbols::SymbolKind;
use crate::vm::VmWriter;

fn compile(source: &str) -> Result<(CompiledClass, String), CompileError> {
    let engine = CompilationEngine::new(source, VmWriter::new(Vec::new()));
    engine
        .compile()
        .map(|(class, out)| (class, String::from_utf8(out).unwrap()))
}

fn compile_ok(source: &str) -> String {
    match compile(source) {
        Ok((_, out)) => out,
        Err(CompileError::Semantic(errors)) => panic!("unexpected semantic errors: {:#?}", errors),
        Err(err) => panic!("unexpected error: {}", err),
    }
}

fn semantic_errors(source: &str) -> Vec<SemanticError> {
    match compile(source) {
        Err(CompileError::Semantic(errors)) => errors,
        Err(err) => panic!("expected semantic errors, got: {}", err),
        Ok((_, out)) => panic!("expected semantic errors, compiled to:\n{}", out),
    }
}

fn messages(source: &str) -> Vec<String> {
    semantic_errors(source)
        .into_iter()
        .map(|e| e.message)
        .collect()
}

fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

// ===== Emitted code =====

#[test]
fn test_function_with_arithmetic_and_external_call() {
    let (class, out) = compile(
        "class Main {
            function void main() {
                var int x;
                let x = 2 + 3 * 4;
                do Output.printInt(x);
                return;
            }
        }",
    )
    .unwrap();

    assert_eq!(
        lines(&out),
        vec![
            "function Main.main 1",
            "push constant 2",
            "push constant 3",
            "push constant 4",
            "call Math.multiply 2",
            "add",
            "pop local 0",
            "push local 0",
            "call Output.printInt 1",
            "pop temp 0",
            "push constant 0",
            "return",
        ]
    );
    assert_eq!(class.class_name, "Main");
    assert_eq!(class.lines, 12);
    assert_eq!(class.unresolved.len(), 1);
    assert_eq!(class.unresolved[0].class_name, "Output");
    assert_eq!(class.unresolved[0].arg_types, Some(vec![crate::types::Type::Int]));
}

#[test]
fn test_constructor_and_methods() {
    let out = compile_ok(
        "class Point {
            field int x, y;
            static int count;

            constructor Point new(int ax, int ay) {
                let x = ax;
                let y = ay;
                return this;
            }

            method int getX() {
                return x;
            }

            method int sum(Point other) {
                return x + other.getX();
            }
        }",
    );

    assert_eq!(
        lines(&out),
        vec![
            "function Point.new 0",
            "push constant 2",
            "call Memory.alloc 1",
            "pop pointer 0",
            "push argument 0",
            "pop this 0",
            "push argument 1",
            "pop this 1",
            "push pointer 0",
            "return",
            "function Point.getX 0",
            "push argument 0",
            "pop pointer 0",
            "push this 0",
            "return",
            "function Point.sum 0",
            "push argument 0",
            "pop pointer 0",
            "push this 0",
            "push argument 1",
            "call Point.getX 1",
            "add",
            "return",
        ]
    );
}

#[test]
fn test_string_literal_is_built_by_character() {
    let out = compile_ok(
        "class Main {
            function void main() {
                do Output.printString(\"Hi\");
                return;
            }
        }",
    );

    assert_eq!(
        lines(&out)[1..8].to_vec(),
        vec![
            "push constant 2",
            "call String.new 1",
            "push constant 72",
            "call String.appendChar 2",
            "push constant 105",
            "call String.appendChar 2",
            "call Output.printString 1",
        ]
    );
}

#[test]
fn test_array_store_and_load() {
    let out = compile_ok(
        "class Main {
            function void main() {
                var Array a;
                var int v;
                let a = Array.new(3);
                let a[1] = 7;
                let v = a[1];
                return;
            }
        }",
    );

    assert_eq!(
        lines(&out),
        vec![
            "function Main.main 2",
            "push constant 3",
            "call Array.new 1",
            "pop local 0",
            "push local 0",
            "push constant 1",
            "add",
            "push constant 7",
            "pop temp 0",
            "pop pointer 1",
            "push temp 0",
            "pop that 0",
            "push local 0",
            "push constant 1",
            "add",
            "pop pointer 1",
            "push that 0",
            "pop local 1",
            "push constant 0",
            "return",
        ]
    );
}

#[test]
fn test_if_else_layout() {
    let out = compile_ok(
        "class Main {
            function int sign(int n) {
                if (n < 0) { return -1; } else { return 1; }
            }
        }",
    );

    assert_eq!(
        lines(&out),
        vec![
            "function Main.sign 0",
            "push argument 0",
            "push constant 0",
            "lt",
            "if-goto IF_TRUE0",
            "goto IF_FALSE0",
            "label IF_TRUE0",
            "push constant 1",
            "neg",
            "return",
            "goto IF_END0",
            "label IF_FALSE0",
            "push constant 1",
            "return",
            "label IF_END0",
        ]
    );
}

#[test]
fn test_if_without_else_has_no_end_label() {
    let out = compile_ok(
        "class Main {
            function void f(boolean b) {
                if (b) { }
                return;
            }
        }",
    );

    assert!(out.contains("label IF_FALSE0"));
    assert!(!out.contains("IF_END0"));
}

#[test]
fn test_while_layout() {
    let out = compile_ok(
        "class Main {
            function void loop() {
                while (true) { }
                return;
            }
        }",
    );

    assert_eq!(
        lines(&out),
        vec![
            "function Main.loop 0",
            "label WHILE_EXP0",
            "push constant 0",
            "not",
            "not",
            "if-goto WHILE_END0",
            "goto WHILE_EXP0",
            "label WHILE_END0",
            "push constant 0",
            "return",
        ]
    );
}

#[test]
fn test_labels_are_unique_across_subroutines() {
    let out = compile_ok(
        "class Main {
            function int f(int n) {
                while (n > 0) {
                    while (n > 5) { let n = n - 1; }
                    let n = n - 1;
                }
                return n;
            }

            function void g() {
                while (false) { }
                if (true) { }
                return;
            }
        }",
    );

    let labels: Vec<&str> = out.lines().filter(|l| l.starts_with("label ")).collect();
    let mut unique = labels.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(labels.len(), unique.len());
    assert!(labels.contains(&"label WHILE_EXP2"));
    assert!(labels.contains(&"label IF_FALSE3"));
}

#[test]
fn test_boolean_literals_and_null() {
    let out = compile_ok(
        "class Main {
            function void main() {
                var boolean b;
                var Main m;
                let b = true;
                let b = false;
                let m = null;
                return;
            }
        }",
    );

    assert_eq!(
        lines(&out)[1..8].to_vec(),
        vec![
            "push constant 0",
            "not",
            "pop local 0",
            "push constant 0",
            "pop local 0",
            "push constant 0",
            "pop local 1",
        ]
    );
}

#[test]
fn test_local_count_spans_the_whole_body() {
    let out = compile_ok(
        "class Main {
            function void main() {
                var int a, b;
                let a = 1;
                var char c;
                let b = a;
                return;
            }
        }",
    );
    assert_eq!(lines(&out)[0], "function Main.main 3");
}

#[test]
fn test_statics_use_static_segment() {
    let out = compile_ok(
        "class Main {
            static int count;
            function void bump() {
                let count = count + 1;
                return;
            }
        }",
    );
    assert!(out.contains("push static 0\npush constant 1\nadd\npop static 0"));
}

// ===== Calls and receivers =====

#[test]
fn test_method_call_from_method_pushes_receiver() {
    let out = compile_ok(
        "class Counter {
            field int n;

            constructor Counter new() {
                let n = 0;
                return this;
            }

            method void bump(int by) {
                let n = n + by;
                return;
            }

            method void twice() {
                do bump(2);
                do Counter.bump(3);
                return;
            }
        }",
    );

    assert!(out.contains("push pointer 0\npush constant 2\ncall Counter.bump 2"));
    assert!(out.contains("push pointer 0\npush constant 3\ncall Counter.bump 2"));
}

#[test]
fn test_function_calling_method_is_rejected() {
    let errors = messages(
        "class Counter {
            method void bump() {
                return;
            }

            function void run() {
                do bump();
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["A function cannot call method 'bump'"]);
}

#[test]
fn test_function_calling_later_method_is_rejected() {
    let errors = messages(
        "class Counter {
            function void run() {
                do bump();
                return;
            }

            method void bump() {
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["A function cannot call method 'bump'"]);
}

#[test]
fn test_function_calling_own_constructor_is_rejected() {
    let errors = messages(
        "class Box {
            constructor Box new() {
                return this;
            }

            function Box make() {
                return Box.new();
            }
        }",
    );
    assert_eq!(errors, vec!["A function cannot call constructor 'new'"]);
}

#[test]
fn test_constructor_call_from_method_passes_no_receiver() {
    let out = compile_ok(
        "class Box {
            constructor Box new() {
                return this;
            }

            method Box copy() {
                return Box.new();
            }
        }",
    );
    assert!(out.contains(
        "function Box.copy 0\npush argument 0\npop pointer 0\ncall Box.new 0\nreturn"
    ));
}

#[test]
fn test_forward_calls_are_resolved_at_end_of_class() {
    let (class, out) = compile(
        "class Main {
            function void main() {
                do Main.helper(1);
                do helper(2);
                return;
            }

            function void helper(int n) {
                return;
            }
        }",
    )
    .unwrap();

    assert!(class.unresolved.is_empty());
    assert!(out.contains("push constant 1\ncall Main.helper 1"));
    assert!(out.contains("push constant 2\ncall Main.helper 1"));
}

#[test]
fn test_forward_call_argument_count_checked_at_end() {
    let errors = semantic_errors(
        "class Main {
            function void main() {
                do helper(1, 2);
                return;
            }

            function void helper(int n) {
                return;
            }
        }",
    );
    assert_eq!(
        errors,
        vec![SemanticError::new("'helper' expects 1 argument(s), found 2", 3)]
    );
}

const FORWARD_FROM_METHOD: &str = "class Main {
    method void run() {
        do helper();
        do Main.go();
        do put(1, 2);
        return;
    }

    function void helper() {
        return;
    }

    method void go() {
        return;
    }

    method void put(int a, int b) {
        return;
    }
}";

const RUN_BODY: &str = "function Main.run 0
push argument 0
pop pointer 0
call Main.helper 0
pop temp 0
push pointer 0
call Main.go 1
pop temp 0
push pointer 0
push constant 1
push constant 2
call Main.put 3
pop temp 0
push constant 0
return
";

#[test]
fn test_forward_calls_from_method_settle_receiver_at_end() {
    let (class, out) = compile(FORWARD_FROM_METHOD).unwrap();
    assert!(out.starts_with(RUN_BODY), "got:\n{}", out);

    let targets: Vec<_> = class
        .resolved
        .iter()
        .map(|r| (r.to_string(), r.member_symbol.as_ref().map(|s| s.kind)))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("helper".to_string(), Some(SymbolKind::Function)),
            ("Main.go".to_string(), Some(SymbolKind::Method)),
            ("put".to_string(), Some(SymbolKind::Method)),
        ]
    );
}

#[test]
fn test_call_code_does_not_depend_on_declaration_order() {
    let earlier = "class Main {
    function void helper() {
        return;
    }

    method void go() {
        return;
    }

    method void put(int a, int b) {
        return;
    }

    method void run() {
        do helper();
        do Main.go();
        do put(1, 2);
        return;
    }
}";
    let out = compile_ok(earlier);
    assert!(out.ends_with(RUN_BODY), "got:\n{}", out);
}

#[test]
fn test_argument_types_checked() {
    let errors = messages(
        "class Main {
            function void main() {
                do take(true);
                return;
            }

            function void take(int n) {
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["Argument 1 of 'take' expects 'int', found 'boolean'"]);
}

#[test]
fn test_method_arity_excludes_receiver() {
    let errors = messages(
        "class Box {
            method void put(int a, int b) {
                return;
            }

            method void fill() {
                do put(1);
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["'put' expects 2 argument(s), found 1"]);
}

#[test]
fn test_call_on_object_of_other_class_is_left_unresolved() {
    let (class, out) = compile(
        "class Game {
            function void run() {
                var Ball ball;
                let ball = Ball.new();
                do ball.move(3);
                return;
            }
        }",
    )
    .unwrap();

    assert!(out.contains("push local 0\npush constant 3\ncall Ball.move 2"));
    let names: Vec<String> = class.unresolved.iter().map(|r| r.to_string()).collect();
    assert_eq!(names, vec!["Ball.new", "ball.move"]);
    assert!(class.unresolved[1].qualifier_symbol.is_some());
}

#[test]
fn test_member_read_through_variable_of_own_class() {
    let out = compile_ok(
        "class Main {
            static int n;

            function void f() {
                var Main p;
                let p = null;
                let n = p.n;
                return;
            }
        }",
    );
    assert_eq!(
        lines(&out),
        vec![
            "function Main.f 1",
            "push constant 0",
            "pop local 0",
            "push static 0",
            "pop static 0",
            "push constant 0",
            "return",
        ]
    );
}

#[test]
fn test_fields_read_through_object_including_later_ones() {
    let out = compile_ok(
        "class Point {
            field int x;

            constructor Point new() {
                let x = 1;
                let y = 2;
                return this;
            }

            function int xOf(Point p) {
                return p.x;
            }

            function int yOf(Point p) {
                return p.y;
            }

            field int y;
        }",
    );
    assert_eq!(
        lines(&out),
        vec![
            "function Point.new 0",
            "push constant 2",
            "call Memory.alloc 1",
            "pop pointer 0",
            "push constant 1",
            "pop this 0",
            "push constant 2",
            "pop this 1",
            "push pointer 0",
            "return",
            "function Point.xOf 0",
            "push argument 0",
            "pop pointer 1",
            "push that 0",
            "return",
            "function Point.yOf 0",
            "push argument 0",
            "pop pointer 1",
            "push that 1",
            "return",
        ]
    );
}

#[test]
fn test_member_of_other_class_is_not_accessible() {
    let errors = messages(
        "class Main {
            function int f(Point p) {
                return p.x + Screen.width;
            }
        }",
    );
    assert_eq!(
        errors,
        vec![
            "Member 'p.x' of class 'Point' is not accessible from class 'Main'",
            "Member 'Screen.width' of class 'Screen' is not accessible from class 'Main'",
        ]
    );
}

#[test]
fn test_member_read_on_primitive_is_rejected() {
    let errors = messages(
        "class Main {
            function int f(int k) {
                return k.x;
            }
        }",
    );
    assert_eq!(errors, vec!["'k' of type 'int' is not an object"]);
}

#[test]
fn test_call_on_primitive_is_rejected() {
    let errors = messages(
        "class Main {
            function void main() {
                var int n;
                let n = 1;
                do n.run();
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["'n' of type 'int' is not an object"]);
}

// ===== Semantic checks =====

#[test]
fn test_int_to_boolean_is_allowed() {
    compile_ok(
        "class Main {
            function void main() {
                var boolean b;
                let b = 1;
                return;
            }
        }",
    );
}

#[test]
fn test_boolean_to_int_is_rejected() {
    let errors = semantic_errors(
        "class Main {
            function void main() {
                var int i;
                let i = true;
                return;
            }
        }",
    );
    assert_eq!(
        errors,
        vec![SemanticError::new(
            "Type mismatch: cannot assign 'boolean' to 'i' of type 'int'",
            4
        )]
    );
}

#[test]
fn test_array_target_accepts_any_value() {
    compile_ok(
        "class Main {
            function void main() {
                var Array a;
                let a = Array.new(2);
                let a[0] = true;
                let a[1] = \"text\";
                return;
            }
        }",
    );
}

#[test]
fn test_array_index_must_be_int() {
    let errors = messages(
        "class Main {
            function void main() {
                var Array a;
                let a = Array.new(2);
                let a[false] = 1;
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["Array index must be of type 'int', found 'boolean'"]);
}

#[test]
fn test_missing_return_reported_once() {
    let errors = semantic_errors(
        "class Main {
            function int f(int n) {
                if (n > 0) {
                    return 1;
                }
            }
        }",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Not all code paths in 'f' return a value");
}

#[test]
fn test_while_does_not_count_as_returning() {
    let errors = messages(
        "class Main {
            function int f() {
                while (true) {
                    return 1;
                }
            }
        }",
    );
    assert_eq!(errors, vec!["Not all code paths in 'f' return a value"]);
}

#[test]
fn test_statement_after_exhaustive_if_is_unreachable() {
    let errors = semantic_errors(
        "class Main {
            function int f() {
                var int y;
                if (true) { return 1; } else { return 2; }
                let y = 3;
                let y = 4;
            }
        }",
    );
    assert_eq!(errors, vec![SemanticError::new("Unreachable code", 5)]);
}

#[test]
fn test_redeclaration_in_same_scope() {
    let errors = messages(
        "class Main {
            field int x;
            static boolean x;

            function void f(int a) {
                var int a;
                return;
            }
        }",
    );
    assert_eq!(
        errors,
        vec![
            "Redeclaration of identifier 'x'",
            "Redeclaration of identifier 'a'",
        ]
    );
}

#[test]
fn test_locals_may_shadow_fields() {
    compile_ok(
        "class Main {
            field int x;

            method int f() {
                var int x;
                let x = 1;
                return x;
            }
        }",
    );
}

#[test]
fn test_subroutine_redeclaration_is_fatal() {
    let err = compile(
        "class Main {
            function void f() { return; }
            function void f() { return; }
        }",
    )
    .unwrap_err();

    assert!(matches!(err, CompileError::Parser(_)));
    assert_eq!(
        err.to_string(),
        "[Parsing error] Line 3: Redeclaration of subroutine 'f'"
    );
}

#[test]
fn test_uninitialized_local_read() {
    let errors = messages(
        "class Main {
            function int f() {
                var int x;
                return x;
            }
        }",
    );
    assert_eq!(errors, vec!["Variable 'x' is used before being initialized"]);
}

#[test]
fn test_undeclared_identifier_is_reported_after_the_class() {
    let errors = semantic_errors(
        "class Main {
            function void f() {
                var int x;
                let x = missing;
                do nowhere();
                return;
            }
        }",
    );
    assert_eq!(
        errors,
        vec![
            SemanticError::new("Identifier 'missing' is used without being declared", 4),
            SemanticError::new("Identifier 'nowhere' is used without being declared", 5),
        ]
    );
}

#[test]
fn test_static_declared_after_use_compiles() {
    let out = compile_ok(
        "class Main {
            function void f() {
                let total = 1;
                return;
            }

            static int total;
        }",
    );
    assert_eq!(
        out,
        "function Main.f 0\npush constant 1\npop static 0\npush constant 0\nreturn\n"
    );
}

#[test]
fn test_class_variables_declared_after_use_are_patched() {
    let (class, out) = compile(
        "class Tally {
            method int sum() {
                return count + size;
            }

            field int size;
            static int count;
        }",
    )
    .unwrap();

    assert_eq!(
        lines(&out),
        vec![
            "function Tally.sum 0",
            "push argument 0",
            "pop pointer 0",
            "push static 0",
            "push this 0",
            "add",
            "return",
        ]
    );
    let kinds: Vec<_> = class
        .resolved
        .iter()
        .map(|r| (r.member.as_str(), r.member_symbol.as_ref().map(|s| s.kind)))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("count", Some(SymbolKind::Static)),
            ("size", Some(SymbolKind::Field)),
        ]
    );
}

#[test]
fn test_field_assigned_before_declaration_counts_as_initialized() {
    let out = compile_ok(
        "class Cell {
            constructor Cell new() {
                let value = 7;
                return this;
            }

            field int value;

            method int get() {
                return value;
            }
        }",
    );
    assert!(out.contains("push constant 7\npop this 0\npush pointer 0\nreturn"));
    assert!(out.contains(
        "function Cell.get 0\npush argument 0\npop pointer 0\npush this 0\nreturn"
    ));
}

#[test]
fn test_field_declared_after_use_in_function_is_rejected() {
    let errors = semantic_errors(
        "class Tally {
            function int peek() {
                return size;
            }

            field int size;
        }",
    );
    assert_eq!(
        errors,
        vec![SemanticError::new("Field 'size' cannot be referenced inside a function", 3)]
    );
}

#[test]
fn test_field_inside_function_is_rejected() {
    let errors = messages(
        "class Main {
            field int x;

            function void f() {
                let x = 1;
                return;
            }
        }",
    );
    assert_eq!(errors, vec!["Field 'x' cannot be referenced inside a function"]);
}

#[test]
fn test_this_inside_function_is_rejected() {
    let errors = messages(
        "class Main {
            function Main f() {
                return this;
            }
        }",
    );
    assert_eq!(errors, vec!["'this' cannot be used inside a function"]);
}

#[test]
fn test_return_value_checks() {
    let errors = messages(
        "class Main {
            function void a() {
                return 1;
            }

            function int b() {
                return;
            }

            function int c() {
                return true;
            }
        }",
    );
    assert_eq!(
        errors,
        vec![
            "Void subroutine 'a' cannot return a value",
            "'b' must return a value of type 'int'",
            "Type mismatch: 'c' returns 'int', found 'boolean'",
        ]
    );
}

#[test]
fn test_nested_var_declaration_is_rejected() {
    let errors = messages(
        "class Main {
            function void f() {
                while (true) {
                    var int x;
                }
                return;
            }
        }",
    );
    assert_eq!(
        errors,
        vec!["Variables must be declared at the top level of a subroutine body"]
    );
}

#[test]
fn test_all_semantic_errors_are_collected() {
    let errors = semantic_errors(
        "class Main {
            function void f() {
                var int i;
                var boolean b;
                let i = true;
                let i = false;
                return;
            }
        }",
    );
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].line, 5);
    assert_eq!(errors[1].line, 6);
}

// ===== Fatal errors and output =====

#[test]
fn test_syntax_error_reports_found_lexeme() {
    let err = compile(
        "class Main {
            function void f() {
                let x = ;
            }
        }",
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[Parsing error] Line 3: expected expression, found ';'"
    );
}

#[test]
fn test_lexical_error_is_fatal() {
    let err = compile("class Main { function void f() { let x = 3x; } }").unwrap_err();
    assert!(matches!(err, CompileError::Parser(_)));
    assert_eq!(err.to_string(), "[Parsing error] Line 1: Malformed number '3x'");
}

#[test]
fn test_trailing_tokens_after_class() {
    let err = compile("class Main { } class Other { }").unwrap_err();
    assert_eq!(
        err.to_string(),
        "[Parsing error] Line 1: expected end of file after the class body, found 'class'"
    );
}

#[test]
fn test_semantic_error_discards_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Main.vm");

    let source = "class Main {
        function void f() {
            var int i;
            let i = true;
            return;
        }
    }";
    let writer = VmWriter::create(&path).unwrap();
    let result = CompilationEngine::new(source, writer).compile();

    assert!(matches!(result, Err(CompileError::Semantic(_))));
    assert!(!path.exists());
}

#[test]
fn test_fatal_error_discards_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Main.vm");

    let source = "class Main {
        function void f() { return; }
        function void g() { return }
    }";
    let writer = VmWriter::create(&path).unwrap();
    let result = CompilationEngine::new(source, writer).compile();

    assert!(matches!(result, Err(CompileError::Parser(_))));
    assert!(!path.exists());
}

#[test]
fn test_symbol_table_survives_compilation() {
    let (class, _) = compile(
        "class Main {
            static int count;
            function void main(int a, char b) {
                var boolean flag;
                let flag = true;
                return;
            }
        }",
    )
    .unwrap();

    let main = class.symbols.lookup_global("main").unwrap();
    let body = main.scope.unwrap();
    assert_eq!(class.symbols.local_count(body), 1);
    assert_eq!(class.symbols.argument_types(body).len(), 2);
}
