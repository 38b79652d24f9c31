mod common;

use common::{ints, run, run_err};
use pretty_assertions::assert_eq;
use quill::interpreter::{Error, InterpreterError, Resolved};
use quill::{Context, Engine, EngineConfig, Value};

#[test]
fn test_function_declaration_and_call() {
    let source = r#"
        function add(a, b) { return a + b; }
        add(2, 3);
    "#;
    assert_eq!(run(source), Value::int(5));
}

#[test]
fn test_missing_arguments_are_null() {
    assert_eq!(run("function f(a, b) { return b; } f(1);"), Value::Null);
}

#[test]
fn test_named_arguments_bind_by_name() {
    let source = r#"
        function span(start, end) { return end - start; }
        [span(end: 10, start: 4), span(3, end: 5)];
    "#;
    assert_eq!(run(source), ints(&[6, 2]));
}

#[test]
fn test_arguments_list() {
    assert_eq!(run("function all() { return arguments; } all(1, 2, 3);"), ints(&[1, 2, 3]));
}

#[test]
fn test_function_without_return_yields_nothing() {
    assert_eq!(run("function f() { 1 + 1; } f();"), Value::Null);
}

#[test]
fn test_frames_are_isolated() {
    let source = r#"
        x = 1;
        function shadow() { x = 99; return x; }
        [shadow(), x];
    "#;
    assert_eq!(run(source), ints(&[99, 1]));
}

#[test]
fn test_recursion() {
    let source = r#"
        function fact(n) { if (n <= 1) return 1; return n * fact(n - 1); }
        fact(10);
    "#;
    assert_eq!(run(source), Value::int(3628800));
}

#[test]
fn test_recursion_limit_is_an_error() {
    let engine = Engine::with_config(EngineConfig::default().with_max_call_depth(16));
    let err = engine
        .run("function down(n) { return down(n + 1); } down(0);", &Context::new())
        .unwrap_err();
    assert!(matches!(err, Error::Runtime(InterpreterError::RecursionLimit { depth: 16, .. })));
}

#[test]
fn test_default_recursion_limit_on_a_small_thread() {
    let err = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            Engine::new()
                .run("function f(n) { return f(n + 1); } f(0);", &Context::new())
                .unwrap_err()
        })
        .unwrap()
        .join()
        .unwrap();
    assert!(matches!(err, Error::Runtime(InterpreterError::RecursionLimit { depth: 100, .. })));
}

#[test]
fn test_deep_recursion_inside_async_workers() {
    let source = r#"
        function f(n) { return f(n + 1); }
        job = async { e = try f(0); e.code; };
        await job;
    "#;
    assert_eq!(run(source), Value::from("E0204"));
}

#[test]
fn test_recursion_limit_can_be_caught() {
    let engine = Engine::with_config(EngineConfig::default().with_max_call_depth(8));
    let result = engine
        .run("function down() { return down(); } e = try down(); e.code;", &Context::new())
        .unwrap();
    assert_eq!(result, Value::from("E0204"));
}

#[test]
fn test_arrow_functions_capture_their_scope() {
    let source = r#"
        function adder(n) { return (x) => x + n; }
        add5 = adder(5);
        add5(3);
    "#;
    assert_eq!(run(source), Value::int(8));
}

#[test]
fn test_arrow_with_block_body() {
    let source = r#"
        clamp = (v, lo, hi) => { if (v < lo) return lo; if (v > hi) return hi; return v; };
        [clamp(-4, 0, 10), clamp(4, 0, 10), clamp(40, 0, 10)];
    "#;
    assert_eq!(run(source), ints(&[0, 4, 10]));
}

#[test]
fn test_functions_are_values() {
    let source = r#"
        function apply(f, x) { return f(x); }
        function double(x) { return x * 2; }
        [apply(double, 21), apply((x) => x - 1, 1)];
    "#;
    assert_eq!(run(source), ints(&[42, 0]));
}

#[test]
fn test_dotted_function_names_and_using() {
    let source = r#"
        function Text.shout(s) { return upper(s) + "!"; }
        a = Text.shout("hi");
        using Text;
        b = shout("yo");
        [a, b];
    "#;
    let result = run(source);
    let values = result.as_context().unwrap().values();
    assert_eq!(values, vec![Value::from("HI!"), Value::from("YO!")]);
}

#[test]
fn test_unknown_call_yields_nothing() {
    assert_eq!(run("nothing_here(1, 2);"), Value::Null);
    assert_eq!(run("x = 5; x.frobnicate();"), Value::Null);
}

#[test]
fn test_call_site_remembers_strategy() {
    let engine = Engine::new();
    let program = engine.parse("function f(x) { return x; } f(1);").unwrap();
    let ctx = Context::new();
    engine.evaluate(&program, &ctx).unwrap();

    let call = match &program.root().kind {
        quill::ast::NodeKind::Sequence(nodes) => match &nodes[1].kind {
            quill::ast::NodeKind::Call(call) => call,
            other => panic!("expected a call, got {:?}", other),
        },
        other => panic!("expected a sequence, got {:?}", other),
    };
    assert_eq!(call.site.resolved(), Some(Resolved::Function));
    assert_eq!(engine.evaluate(&program, &ctx).unwrap(), Value::int(1));
}

#[test]
fn test_call_site_adapts_to_receiver_shape() {
    let source = r#"
        class Box { size() { return 3; } }
        function measure(thing) { return thing.size(); }
        [measure(new Box()), measure({ size: (x) => 7 }), measure([1, 2])];
    "#;
    let result = run(source);
    let values = result.as_context().unwrap().values();
    assert_eq!(values[0], Value::int(3));
    assert_eq!(values[1], Value::int(7));
    assert_eq!(values[2], Value::Null);
}

#[test]
fn test_call_site_reconsiders_earlier_strategies() {
    let source = r#"
        class Bag { count() { return 99; } }
        out = [];
        foreach (o in [{ a: 1 }, new Bag(), { count: () => 5 }, { b: 2, c: 3 }]) out.push(o.Value.count());
        out;
    "#;
    assert_eq!(run(source), ints(&[1, 99, 5, 2]));
}

#[test]
fn test_call_site_sees_later_declarations() {
    let engine = Engine::new();
    let program = engine.parse(r#"len("abc");"#).unwrap();
    let ctx = Context::new();
    assert_eq!(engine.evaluate(&program, &ctx).unwrap(), Value::int(3));

    engine.run("function len(x) { return 42; }", &ctx).unwrap();
    assert_eq!(engine.evaluate(&program, &ctx).unwrap(), Value::int(42));
}

#[test]
fn test_builtins() {
    assert_eq!(run(r#"len("hello");"#), Value::int(5));
    assert_eq!(run(r#"upper("abc") + lower("DEF");"#), Value::from("ABCdef"));
    assert_eq!(run(r#"join(split("a-b-c", "-"), "+");"#), Value::from("a+b+c"));
    assert_eq!(run("[floor(2.7), ceil(2.1), abs(-3), min(4, 2, 8), max(4, 2, 8)];"), ints(&[2, 3, 3, 2, 8]));
    assert_eq!(run(r#"typeof({});"#), Value::from("map"));
    assert_eq!(run(r#"num("nope");"#), Value::Null);
}

#[test]
fn test_builtins_as_methods() {
    assert_eq!(run(r#"name = "  Ada "; name.trim().upper();"#), Value::from("ADA"));
    assert_eq!(run("[3, 1, 2].len();"), Value::int(3));
}

#[test]
fn test_ambient_operations() {
    assert_eq!(run("list = [1, 2]; list.push(3); list.count();"), Value::int(3));
    assert_eq!(run("m = { a: 1 }; [m.contains(\"a\"), m.contains(\"b\")];"), {
        Value::Context(Context::from_values([Value::Bool(true), Value::Bool(false)]))
    });
    assert_eq!(run("a = 1; b = 2; count();"), Value::int(2));
}

#[test]
fn test_errors_propagate_out_of_calls() {
    let err = run_err("function f() { return 1 / 0; } f();");
    assert!(matches!(err, Error::Runtime(InterpreterError::DivisionByZero { .. })));
}
