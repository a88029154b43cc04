mod common;

use pretty_assertions::assert_eq;

use rox::ast::{ExprKind, LiteralValue, Stmt};
use rox::ast_printer::AstPrinter;
use rox::parser::Parser;
use rox::scanner::scan_tokens;

fn parse(source: &str) -> Vec<Stmt> {
    let (tokens, errors) = scan_tokens(source);
    assert!(errors.is_empty(), "scan errors: {:?}", errors);
    Parser::new(tokens).parse().expect("program should parse")
}

fn parse_errors(source: &str) -> Vec<String> {
    let (tokens, _) = scan_tokens(source);
    match Parser::new(tokens).parse() {
        Ok(_) => panic!("expected parse errors for {:?}", source),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    }
}

fn print_expr(source: &str) -> String {
    let expr = rox::parse_expression(source).expect("expression should parse");
    AstPrinter.print(&expr)
}

#[test]
fn precedence_ladder() {
    assert_eq!(print_expr("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
    assert_eq!(print_expr("(1 + 2) * 3"), "(* (group (+ 1.0 2.0)) 3.0)");
    assert_eq!(print_expr("-a < b == !c"), "(== (< (- a) b) (! c))");
    assert_eq!(print_expr("a or b and c"), "(or a (and b c))");
    assert_eq!(print_expr("1 - 2 - 3"), "(- (- 1.0 2.0) 3.0)");
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(print_expr("a = b = 1"), "(= a (= b 1.0))");
}

#[test]
fn calls_and_property_access() {
    assert_eq!(print_expr("a.b(1, 2).c"), "(. c (call (. b a) 1.0 2.0))");
    assert_eq!(print_expr("a.b = c"), "(set b a c)");
    assert_eq!(print_expr("super.m"), "(super m)");
}

#[test]
fn for_loop_is_lowered_to_while() {
    let statements = parse("for (var i = 0; i < 3; i = i + 1) print i;");
    assert_eq!(statements.len(), 1);

    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected block, got {:?}", statements[0]);
    };
    assert!(matches!(outer[0], Stmt::Var { .. }));

    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected while, got {:?}", outer[1]);
    };
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected body block, got {:?}", body);
    };
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(_)));
}

#[test]
fn empty_for_condition_defaults_to_true() {
    let statements = parse("for (;;) print 1;");

    let Stmt::While { condition, .. } = &statements[0] else {
        panic!("expected bare while, got {:?}", statements[0]);
    };
    assert_eq!(condition.kind, ExprKind::Literal(LiteralValue::True));
}

#[test]
fn class_with_superclass_and_methods() {
    let statements = parse("class B < A { init(x) { this.x = x; } get() { return this.x; } }");

    let Stmt::Class {
        name,
        superclass,
        methods,
    } = &statements[0]
    else {
        panic!("expected class, got {:?}", statements[0]);
    };

    assert_eq!(name.lexeme, "B");
    assert!(matches!(
        superclass.as_ref().map(|e| &e.kind),
        Some(ExprKind::Variable(t)) if t.lexeme == "A"
    ));
    let names: Vec<&str> = methods.iter().map(|m| m.name.lexeme.as_str()).collect();
    assert_eq!(names, vec!["init", "get"]);
    assert_eq!(methods[0].params.len(), 1);
}

#[test]
fn identical_expressions_get_distinct_ids() {
    let statements = parse("a; a;");

    let (Stmt::Expression(first), Stmt::Expression(second)) = (&statements[0], &statements[1])
    else {
        panic!("expected two expression statements");
    };

    assert_eq!(first.kind, second.kind);
    assert_ne!(first.id, second.id);
}

#[test]
fn invalid_assignment_target_is_reported_without_unwinding() {
    let errors = parse_errors("a + b = c;\nprint 1;");
    assert_eq!(
        errors,
        vec!["[line 1] Error at '=': Invalid assignment target."]
    );
}

#[test]
fn recovery_reports_one_error_per_broken_statement() {
    let errors = parse_errors("var = 1;\nprint (;\nvar ok = 2;\nfun f( { }");
    assert_eq!(
        errors,
        vec![
            "[line 1] Error at '=': Expect variable name.",
            "[line 2] Error at ';': Expect expression.",
            "[line 4] Error at '{': Expect parameter name.",
        ]
    );
}

#[test]
fn error_at_end_of_input() {
    let errors = parse_errors("print 1");
    assert_eq!(errors, vec!["[line 1] Error at end: Expect ';' after value."]);
}

#[test]
fn too_many_parameters() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    let errors = parse_errors(&source);
    assert_eq!(
        errors,
        vec!["[line 1] Error at 'p255': Can't have more than 255 parameters."]
    );
}

#[test]
fn too_many_arguments() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));

    let errors = parse_errors(&source);
    assert_eq!(
        errors,
        vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
    );
}

#[test]
fn lone_expression_must_consume_all_input() {
    let errors = rox::parse_expression("1 2").expect_err("trailing token");
    assert_eq!(
        errors[0].to_string(),
        "[line 1] Error at '2': Expect end of expression."
    );
}

#[test]
fn parse_reports_scan_errors_too() {
    let (output, result) = common::run("print 1; $");
    assert_eq!(output, "");
    let error = result.expect_err("static error");
    assert_eq!(error.exit_code(), 65);
    assert_eq!(error.to_string(), "[line 1] Error: Unexpected character.");
}
