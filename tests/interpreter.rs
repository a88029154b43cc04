mod common;

use std::io::{self, Write};

use pretty_assertions::assert_eq;

use common::{output_of, run, runtime_error, session};
use rox::error::LoxError;
use rox::{Lox, RunError, EXIT_RUNTIME_ERROR};

#[test]
fn arithmetic_and_printing() {
    assert_eq!(
        output_of("print 1 + 2 * 3; print 10 / 4; print -(3); print 7 - 10;"),
        vec!["7", "2.5", "-3", "-3"]
    );
}

#[test]
fn string_concatenation() {
    assert_eq!(output_of("print \"foo\" + \"bar\";"), vec!["foobar"]);
}

#[test]
fn plus_stringifies_mismatched_operands() {
    assert_eq!(
        output_of("print \"a\" + 1; print 2 + \"b\"; print nil + true; print \"x\" + 1.5;"),
        vec!["a1", "2b", "niltrue", "x1.5"]
    );
}

#[test]
fn division_by_zero_does_not_trap() {
    assert_eq!(
        output_of("print 1 / 0; print -1 / 0; print 0 / 0 == 0 / 0;"),
        vec!["inf", "-inf", "false"]
    );
}

#[test]
fn numeric_operator_on_string_is_a_runtime_error() {
    let (_, error) = runtime_error("var s = \"a\";\nprint s / 2;");
    assert_eq!(error, "Operands must be numbers.\n[line 2]");
}

#[test]
fn comparison_requires_numbers() {
    let (_, error) = runtime_error("print 1 < \"2\";");
    assert_eq!(error, "Operands must be numbers.\n[line 1]");
}

#[test]
fn negating_a_non_number() {
    let (_, error) = runtime_error("print -\"x\";");
    assert_eq!(error, "Operand must be a number.\n[line 1]");
}

#[test]
fn equality_never_coerces() {
    assert_eq!(
        output_of(
            "print 1 == \"1\"; print nil == nil; print nil == false; \
             print \"a\" == \"a\"; print 1 != 2; print true == true;"
        ),
        vec!["false", "true", "false", "true", "true", "true"]
    );
}

#[test]
fn truthiness() {
    assert_eq!(
        output_of("print !nil; print !false; print !0; print !\"\"; if (0) print \"zero\";"),
        vec!["true", "true", "false", "false", "zero"]
    );
}

#[test]
fn logical_operators_yield_operand_values() {
    assert_eq!(
        output_of("print nil or \"yes\"; print 1 and 2; print false and boom; print 3 or boom;"),
        vec!["yes", "2", "false", "3"]
    );
}

#[test]
fn blocks_shadow_and_restore() {
    assert_eq!(
        output_of("var a = \"outer\"; { var a = \"inner\"; print a; } print a;"),
        vec!["inner", "outer"]
    );
}

#[test]
fn assignment_reaches_enclosing_scope() {
    assert_eq!(
        output_of("var a = 1; { a = 2; { a = a + 1; } } print a;"),
        vec!["3"]
    );
}

#[test]
fn undefined_variable() {
    let (_, error) = runtime_error("print nope;");
    assert_eq!(error, "Undefined variable 'nope'.\n[line 1]");

    let (_, error) = runtime_error("\nnope = 1;");
    assert_eq!(error, "Undefined variable 'nope'.\n[line 2]");
}

#[test]
fn control_flow() {
    assert_eq!(
        output_of(
            "var i = 0; while (i < 3) { print i; i = i + 1; }\n\
             for (var j = 0; j < 2; j = j + 1) print j;\n\
             if (false) print \"no\"; else print \"else\";"
        ),
        vec!["0", "1", "2", "0", "1", "else"]
    );
}

#[test]
fn for_loop_variable_is_scoped_to_the_loop() {
    let (_, error) = runtime_error("for (var k = 0; k < 1; k = k + 1) {}\nprint k;");
    assert_eq!(error, "Undefined variable 'k'.\n[line 2]");
}

#[test]
fn closures_keep_mutable_state() {
    assert_eq!(
        output_of(
            "fun makeCounter() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }\n\
             var c = makeCounter();\n\
             print c();\n\
             print c();\n\
             var d = makeCounter();\n\
             print d();"
        ),
        vec!["1", "2", "1"]
    );
}

#[test]
fn closures_bind_lexically_not_dynamically() {
    assert_eq!(
        output_of(
            "var a = \"global\";\n\
             {\n\
               fun show() { print a; }\n\
               show();\n\
               var a = \"block\";\n\
               show();\n\
             }"
        ),
        vec!["global", "global"]
    );
}

#[test]
fn recursion() {
    assert_eq!(
        output_of("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);"),
        vec!["610"]
    );
}

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(output_of("fun f() {} print f();"), vec!["nil"]);
}

#[test]
fn return_unwinds_through_loops_and_blocks() {
    assert_eq!(
        output_of(
            "fun first() { var i = 0; while (true) { { if (i == 3) return i; } i = i + 1; } }\n\
             print first();\n\
             var after = \"scope ok\"; print after;"
        ),
        vec!["3", "scope ok"]
    );
}

#[test]
fn callable_values_print() {
    assert_eq!(
        output_of("fun f() {} class C {} print f; print clock; print C; print C();"),
        vec!["<fn f>", "<native fn>", "C", "C instance"]
    );
}

#[test]
fn clock_returns_seconds() {
    assert_eq!(output_of("print clock() > 1000000000;"), vec!["true"]);
}

#[test]
fn calling_a_non_callable() {
    let (_, error) = runtime_error("\"text\"();");
    assert_eq!(error, "Can only call functions and classes.\n[line 1]");
}

#[test]
fn arity_mismatch() {
    let (_, error) = runtime_error("fun f(a, b) {}\nf(1);");
    assert_eq!(error, "Expected 2 arguments but got 1.\n[line 2]");

    let (_, error) = runtime_error("clock(1);");
    assert_eq!(error, "Expected 0 arguments but got 1.\n[line 1]");
}

#[test]
fn arguments_evaluate_left_to_right() {
    assert_eq!(
        output_of(
            "var log = \"\";\n\
             fun note(x) { log = log + x; return x; }\n\
             fun three(a, b, c) {}\n\
             three(note(\"a\"), note(\"b\"), note(\"c\"));\n\
             print log;"
        ),
        vec!["abc"]
    );
}

#[test]
fn instances_hold_fields() {
    assert_eq!(
        output_of(
            "class Box {}\n\
             var b = Box();\n\
             b.value = 1;\n\
             b.value = b.value + 1;\n\
             print b.value;"
        ),
        vec!["2"]
    );
}

#[test]
fn undefined_property() {
    let (_, error) = runtime_error("class A {}\nA().missing;");
    assert_eq!(error, "Undefined property 'missing'.\n[line 2]");
}

#[test]
fn properties_only_on_instances() {
    let (_, error) = runtime_error("var x = 1; print x.y;");
    assert_eq!(error, "Only instances have properties.\n[line 1]");

    let (_, error) = runtime_error("var x = 1; x.y = 2;");
    assert_eq!(error, "Only instances have fields.\n[line 1]");
}

#[test]
fn methods_bind_this() {
    assert_eq!(
        output_of(
            "class Person {\n\
               init(name) { this.name = name; }\n\
               greet() { return \"hi \" + this.name; }\n\
             }\n\
             var p = Person(\"ada\");\n\
             var greet = p.greet;\n\
             p.name = \"grace\";\n\
             print greet();"
        ),
        vec!["hi grace"]
    );
}

#[test]
fn fields_shadow_methods() {
    assert_eq!(
        output_of(
            "class A { m() { return \"method\"; } }\n\
             var a = A();\n\
             print a.m();\n\
             a.m = \"field\";\n\
             print a.m;"
        ),
        vec!["method", "field"]
    );
}

#[test]
fn initializer_arity_and_result() {
    assert_eq!(
        output_of(
            "class P { init(x, y) { this.x = x; this.y = y; return; } }\n\
             var p = P(1, 2);\n\
             print p.x + p.y;\n\
             print p.init(3, 4) == p;\n\
             print p.x;"
        ),
        vec!["3", "true", "3"]
    );

    let (_, error) = runtime_error("class P { init(x) {} }\nP();");
    assert_eq!(error, "Expected 1 arguments but got 0.\n[line 2]");
}

#[test]
fn initializer_ignores_explicit_return_value() {
    assert_eq!(
        output_of("class A { init() { return 42; } } print A(); print A().init();"),
        vec!["A instance", "A instance"]
    );
}

#[test]
fn inheritance_and_super() {
    assert_eq!(
        output_of(
            "class A { m() { return \"A.m\"; } who() { return \"A\"; } }\n\
             class B < A { m() { return \"B.m/\" + super.m(); } }\n\
             class C < B { m() { return \"C.m/\" + super.m(); } }\n\
             print C().m();\n\
             print C().who();"
        ),
        vec!["C.m/B.m/A.m", "A"]
    );
}

#[test]
fn super_starts_above_the_defining_class() {
    // `super` inside B refers to A even when called on a C that overrides m.
    assert_eq!(
        output_of(
            "class A { m() { return \"A\"; } }\n\
             class B < A { m() { return \"B\"; } test() { return super.m(); } }\n\
             class C < B { m() { return \"C\"; } }\n\
             print C().test();"
        ),
        vec!["A"]
    );
}

#[test]
fn inherited_initializer() {
    assert_eq!(
        output_of(
            "class A { init(v) { this.v = v; } }\n\
             class B < A {}\n\
             print B(7).v;"
        ),
        vec!["7"]
    );
}

#[test]
fn super_method_missing() {
    let (_, error) = runtime_error(
        "class A {}\n\
         class B < A { m() { return super.nope(); } }\n\
         B().m();",
    );
    assert_eq!(error, "Undefined property 'nope'.\n[line 2]");
}

#[test]
fn superclass_must_be_a_class() {
    let (_, error) = runtime_error("var NotAClass = 1;\nclass B < NotAClass {}");
    assert_eq!(error, "Superclass must be a class.\n[line 2]");
}

#[test]
fn class_can_refer_to_itself_in_methods() {
    assert_eq!(
        output_of(
            "class Node { make() { return Node(); } }\n\
             print Node().make();"
        ),
        vec!["Node instance"]
    );
}

#[test]
fn runtime_error_stops_the_run_but_keeps_earlier_output() {
    let (output, result) = run("print \"before\";\nprint 1 - nil;\nprint \"after\";");
    assert_eq!(output, "before\n");

    let error = result.expect_err("runtime error");
    assert_eq!(error.exit_code(), EXIT_RUNTIME_ERROR);
    assert!(matches!(error, RunError::Runtime(_)));
}

#[test]
fn static_errors_suppress_execution() {
    let (output, result) = run("print \"never\";\n{ var a; var a; }");
    assert_eq!(output, "");
    assert!(matches!(result, Err(RunError::Static(ref errors)) if errors.len() == 1));
}

#[test]
fn session_survives_errors_between_runs() {
    let (mut lox, buffer) = session();

    lox.run("var count = 1; fun bump() { count = count + 1; return count; }")
        .expect("definitions run");

    // A runtime error inside a nested block and call must not leave the
    // interpreter pointing at a dead scope.
    let error = lox
        .run("{ var local = 1; fun boom() { return local - nil; } boom(); }")
        .expect_err("runtime error");
    assert!(matches!(error, RunError::Runtime(_)));

    lox.run("print bump(); var local = \"global again\"; print local;")
        .expect("session still usable");

    assert_eq!(buffer.contents(), "2\nglobal again\n");
}

#[test]
fn closures_from_earlier_runs_keep_their_bindings() {
    let (mut lox, buffer) = session();

    lox.run("fun make() { var n = 10; fun get() { return n; } return get; } var g = make();")
        .expect("first run");
    lox.run("{ var n = 99; print g(); }").expect("second run");

    assert_eq!(buffer.contents(), "10\n");
}

#[test]
fn evaluate_single_expression() {
    let (mut lox, _) = session();

    let value = lox.evaluate("(1 + 2) * 4").expect("evaluates");
    assert_eq!(value.to_string(), "12");

    let error = lox.evaluate("1 +").expect_err("static error");
    assert_eq!(error.to_string(), "[line 1] Error at end: Expect expression.");
}

#[test]
fn deep_recursion_completes() {
    assert_eq!(
        output_of(
            "fun count(n) { if (n == 0) return 0; return 1 + count(n - 1); }\n\
             print count(10000);"
        ),
        vec!["10000"]
    );
}

#[test]
fn deeply_nested_source_is_analyzed() {
    let depth = 2000;
    let source = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(output_of(&source), vec!["1"]);
}

#[test]
fn runaway_recursion_is_a_runtime_error() {
    let (mut lox, buffer) = session();

    let error = lox
        .run("fun forever(n) { return forever(n + 1); }\nforever(0);")
        .expect_err("runtime error");
    assert_eq!(error.to_string(), "Stack overflow.\n[line 1]");
    assert_eq!(error.exit_code(), EXIT_RUNTIME_ERROR);

    // the depth counter unwinds with the error
    lox.run("fun three(n) { if (n == 0) return \"done\"; return three(n - 1); } print three(3);")
        .expect("session still usable");
    assert_eq!(buffer.contents(), "done\n");
}

/// Accepts writes but refuses to flush.
struct UnflushableSink;

impl Write for UnflushableSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }
}

#[test]
fn flush_failure_is_reported_after_a_clean_run() {
    let mut lox = Lox::with_output(Box::new(UnflushableSink));

    let error = lox.run("print 1;").expect_err("flush fails");
    assert!(matches!(error, RunError::Runtime(LoxError::Io(_))));
}

#[test]
fn runtime_error_wins_over_flush_failure() {
    let mut lox = Lox::with_output(Box::new(UnflushableSink));

    let error = lox.run("print nil - 1;").expect_err("runtime error");
    assert_eq!(error.to_string(), "Operands must be numbers.\n[line 1]");
}
