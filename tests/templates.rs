mod common;

use common::{render, users_context};
use pretty_assertions::assert_eq;
use quill::interpreter::{Error, ParseError};
use quill::{Context, Engine, Value};

#[test]
fn test_plain_text_passes_through() {
    assert_eq!(render("just <b>text</b>\n", &Context::new()), "just <b>text</b>\n");
    assert_eq!(render("", &Context::new()), "");
}

#[test]
fn test_output_tags() {
    let ctx = Context::new();
    ctx.set("name", Value::from("Ada"));
    ctx.set("n", Value::int(3));
    assert_eq!(render("Hi <%= name %>, <%= n * 2 %>!", &ctx), "Hi Ada, 6!");
}

#[test]
fn test_output_of_nothing_is_empty() {
    assert_eq!(render("[<%= missing %>]", &Context::new()), "[]");
}

#[test]
fn test_assignments_and_declarations_are_silent() {
    let source = "<% x = 5; function f() { return 1; } %>x is <%= x %>";
    assert_eq!(render(source, &Context::new()), "x is 5");
}

#[test]
fn test_bare_expressions_in_code_blocks_stream() {
    assert_eq!(render("<% 1 + 2; %>|<% \"a\"; %>", &Context::new()), "3|a");
}

#[test]
fn test_code_blocks_span_braces() {
    let source = "<% if (show) { %>shown<% } else { %>hidden<% } %>";
    let ctx = Context::new();
    ctx.set("show", Value::Bool(true));
    assert_eq!(render(source, &ctx), "shown");
    ctx.set("show", Value::Bool(false));
    assert_eq!(render(source, &ctx), "hidden");
}

#[test]
fn test_loops_repeat_text() {
    let source = "<ul><% foreach (u in users) { %><li><%= u.Value.name %></li><% } %></ul>";
    assert_eq!(
        render(source, &users_context()),
        "<ul><li>Alice</li><li>Bob</li><li>Charlie</li></ul>"
    );
}

#[test]
fn test_for_loop_with_break() {
    let source = "<% for (i = 0; i < 10; i += 1) { if (i == 3) break; %><%= i %>,<% } %>";
    assert_eq!(render(source, &Context::new()), "0,1,2,");
}

#[test]
fn test_function_bodies_stream_into_the_output() {
    let source = r#"<% function greet(who) { %>Hello <%= who %>! <% } %><% greet("Ada"); greet("Bob"); %>"#;
    assert_eq!(render(source, &Context::new()), "Hello Ada! Hello Bob! ");
}

#[test]
fn test_return_value_is_not_streamed() {
    let source = "<% function add(a, b) { return a + b; } add(1, 2); %>=<%= add(1, 2) %>";
    assert_eq!(render(source, &Context::new()), "=3");
}

#[test]
fn test_switch_in_template() {
    let source = r#"<% switch (kind) { case "a": %>A<% case "b": %>B<% default: %>?<% } %>"#;
    let ctx = Context::new();
    ctx.set("kind", Value::from("b"));
    assert_eq!(render(source, &ctx), "B");
    ctx.set("kind", Value::from("z"));
    assert_eq!(render(source, &ctx), "?");
}

#[test]
fn test_builtin_results_stream() {
    assert_eq!(render(r#"<% upper("shout"); %>"#, &Context::new()), "SHOUT");
}

#[test]
fn test_template_mutates_root_context() {
    let ctx = Context::new();
    render("<% visits = 1; %>", &ctx);
    assert_eq!(ctx.get("visits"), Some(Value::int(1)));
}

#[test]
fn test_unterminated_output_tag_is_located() {
    let err = Engine::new().render("Hello <%= name", &Context::new()).unwrap_err();
    match err {
        Error::Parse(ParseError::Unterminated { what, span }) => {
            assert_eq!(what, "output tag");
            assert_eq!(span.start, 6);
        }
        other => panic!("expected an unterminated tag, got {:?}", other),
    }
}

#[test]
fn test_runtime_error_inside_template() {
    let err = Engine::new().render("a<%= 1 / 0 %>b", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Runtime(_)));
}

#[test]
fn test_evaluate_to_appends() {
    let engine = Engine::new();
    let program = engine.parse_template("<%= n %>;").unwrap();
    let mut out = String::from(">");
    for n in 1..=3 {
        let ctx = Context::new();
        ctx.set("n", Value::int(n));
        engine.evaluate_to(&program, &mut out, &ctx).unwrap();
    }
    assert_eq!(out, ">1;2;3;");
}
