//! Parse errors, runtime exceptions and their rendered diagnostics.

mod common;

use common::{run, run_err};
use pretty_assertions::assert_eq;
use quill::diagnostic::{render_diagnostics, Span};
use quill::interpreter::{Error, InterpreterError, ParseError};
use quill::{Context, Engine, Value};

fn parse_err(source: &str) -> ParseError {
    match Engine::new().parse(source) {
        Ok(program) => panic!("`{}` should not parse, got {}", source, program),
        Err(e) => e,
    }
}

// =============================================================================
// PARSE ERRORS
// =============================================================================

#[test]
fn test_if_without_parenthesis() {
    let err = parse_err("if x) { y = 1; }");
    assert!(matches!(err, ParseError::Expected { .. }));
    assert_eq!(err.span(), Span::point(3));
    assert_eq!(err.code(), "E0101");
}

#[test]
fn test_unclosed_brace() {
    assert!(matches!(parse_err("while (true) { x = 1;"), ParseError::Unterminated { what: "block", .. }));
}

#[test]
fn test_unclosed_paren() {
    assert!(matches!(parse_err("x = (1 + 2;"), ParseError::Unmatched { bracket: '(', .. }));
    assert!(matches!(parse_err("f(1, 2;"), ParseError::Unmatched { bracket: '(', .. }));
}

#[test]
fn test_unclosed_bracket() {
    assert!(matches!(parse_err("x = [1, 2;"), ParseError::Unmatched { bracket: '[', .. }));
}

#[test]
fn test_unterminated_string() {
    let err = parse_err("x = \"never closed;");
    assert!(matches!(err, ParseError::Unterminated { what: "string", .. }));
    assert_eq!(err.span(), Span::point(4));
}

#[test]
fn test_missing_operand() {
    assert!(matches!(parse_err("x = 1 + ;"), ParseError::Expected { .. }));
}

#[test]
fn test_stray_input() {
    assert!(matches!(parse_err("x = 1; ]"), ParseError::Unexpected { ref found, .. } if found == "]"));
}

#[test]
fn test_malformed_declarations() {
    assert!(matches!(parse_err("function (a) { }"), ParseError::Expected { .. }));
    assert!(matches!(parse_err("class { }"), ParseError::Expected { .. }));
    assert!(matches!(parse_err("foreach (x of list) { }"), ParseError::Expected { .. }));
    assert!(matches!(parse_err("switch (x) { x = 1; }"), ParseError::Expected { .. }));
}

#[test]
fn test_keyword_prefixes_are_identifiers() {
    assert_eq!(run("iffy = 2; format = 3; iffy * format;"), Value::int(6));
}

#[test]
fn test_parse_errors_surface_through_run() {
    assert!(matches!(run_err("if (x"), Error::Parse(_)));
}

// =============================================================================
// RUNTIME EXCEPTIONS
// =============================================================================

#[test]
fn test_thrown_values_propagate() {
    match run_err(r#"function check(n) { if (n < 0) throw "negative"; return n; } check(-1);"#) {
        Error::Runtime(InterpreterError::Thrown { value, .. }) => assert_eq!(value, Value::from("negative")),
        other => panic!("expected a thrown value, got {:?}", other),
    }
}

#[test]
fn test_caught_exception_members() {
    let source = r#"
        e = try { throw { reason: "bad input" }; };
        [e.code, e.value.reason, e.message];
    "#;
    let result = run(source);
    let values = result.as_context().unwrap().values();
    assert_eq!(values[0], Value::from("E0205"));
    assert_eq!(values[1], Value::from("bad input"));
    assert!(values[2].render().contains("bad input"));
}

#[test]
fn test_try_catches_errors_in_nested_calls() {
    let source = r#"
        function inner() { return 10 % 0; }
        function outer() { return inner() + 1; }
        e = try outer();
        e.message;
    "#;
    assert_eq!(run(source), Value::from("division by zero"));
}

#[test]
fn test_execution_stops_at_the_error() {
    let ctx = Context::new();
    let err = Engine::new().run("a = 1; b = 1 / 0; c = 3;", &ctx).unwrap_err();
    assert!(matches!(err, Error::Runtime(InterpreterError::DivisionByZero { .. })));
    assert_eq!(ctx.get("a"), Some(Value::int(1)));
    assert_eq!(ctx.get("c"), None);
}

#[test]
fn test_dispatch_misses_are_not_errors() {
    assert_eq!(run("x = 1; x.nothing(); missing.also(2); 5;"), Value::int(5));
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

#[test]
fn test_runtime_diagnostic_points_at_line() {
    let source = "x = 1;\ny = x / 0;\n";
    let err = Engine::new().run(source, &Context::new()).unwrap_err();
    let output = render_diagnostics(source, "calc.ql", &[err.to_diagnostic()], false);
    assert!(output.contains("error[E0202]"));
    assert!(output.contains("calc.ql:2:"));
    assert!(output.contains("divisor is zero"));
}

#[test]
fn test_parse_diagnostic_has_label() {
    let source = "if x) { }";
    let err = parse_err(source);
    let output = render_diagnostics(source, "script", &[err.to_diagnostic()], false);
    assert!(output.contains("error[E0101]"));
    assert!(output.contains("script:1:4"));
    assert!(output.contains("expected `(` here"));
}

#[test]
fn test_uncaught_throw_suggests_try() {
    let source = "throw 42;";
    let err = run_err(source);
    let output = render_diagnostics(source, "script", &[err.to_diagnostic()], false);
    assert!(output.contains("error[E0205]"));
    assert!(output.contains("help: wrap the statement in `try`"));
}
