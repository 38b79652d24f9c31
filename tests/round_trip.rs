//! A program's rendering parses back into a program that evaluates the same.

use pretty_assertions::assert_eq;
use quill::format::value_to_json_string;
use quill::{Context, Engine, Value};

const SCRIPTS: &[&str] = &[
    "x = 1 + 2 * 3; y = (1 + 2) * 3; z = -x + !0; [x, y, z];",
    r#"s = "quote \" and \\ slash\n"; s + 'single';"#,
    "m = { a: 1, \"two words\": [1, 2.5, null, true] }; m.a + m[\"two words\"].1;",
    "total = 0; for (i = 0; i < 10; i += 1) { if (i % 2 == 0) continue; if (i > 7) break; total += i; } total;",
    "n = 0; while (n < 5) n += 2; do { n -= 1; } while (n > 3); n;",
    "out = \"\"; foreach (c in \"abc\") out = c.Value + out; out;",
    r#"switch (3) { case 1: r = "one"; case >= 3: r = "big"; default: r = "other"; } r;"#,
    "function fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } fib(12);",
    "function span(start, end) { return end - start; } span(end: 9, start: 2);",
    "add = (a, b) => a + b; twice = (f, x) => { return f(f(x, 1), 1); }; twice(add, 5);",
    r#"class Base { tag = "b"; describe() { return tag + kind(); } kind() { return "?"; } }
       class Leaf : Base { Leaf(t) { this.tag = t; } kind() { return "!"; } }
       new Leaf("x").describe();"#,
    "class Maths { static function sq(x) { return x * x; } } Maths.sq(7);",
    "e = try (1 / 0); f = try { throw { why: \"no\" }; }; [e.code, f.value.why];",
    "v = true ? 1 : 2; w = v > 1 ? \"a\" : v == 1 ? \"b\" : \"c\"; w;",
    "Static.k = 3; function get() { return Static.k; } get();",
    "f = async { 6 * 7; }; await f;",
    "list = [1, 2]; list.push(3); list.count();",
    "function Ns.id(x) { return x; } using Ns; id(4);",
];

fn evaluate(engine: &Engine, source: &str) -> (String, String) {
    let ctx = Context::new();
    let value = engine
        .run(source, &ctx)
        .unwrap_or_else(|e| panic!("`{}` failed: {}", source, e));
    let scope = Value::Context(ctx);
    (value_to_json_string(&value, true), value_to_json_string(&scope, true))
}

#[test]
fn test_scripts_survive_a_round_trip() {
    for source in SCRIPTS {
        let rendered = Engine::new()
            .parse(source)
            .unwrap_or_else(|e| panic!("`{}` does not parse: {}", source, e))
            .to_string();
        let original = evaluate(&Engine::new(), source);
        let again = evaluate(&Engine::new(), &rendered);
        assert_eq!(again, original, "rendering was `{}`", rendered);
    }
}

#[test]
fn test_rendering_is_stable() {
    for source in SCRIPTS {
        let once = Engine::new().parse(source).unwrap().to_string();
        let twice = Engine::new().parse(&once).unwrap().to_string();
        assert_eq!(twice, once);
    }
}

#[test]
fn test_templates_survive_a_round_trip() {
    let templates = [
        "<ul><% foreach (i in items) { %><li><%= i.Value %></li><% } %></ul>",
        "<% if (items.count() > 2) { %>many<% } else { %>few<% } %> done",
        "<% function row(x) { %>[<%= x %>]<% } row(1); row(2); %>",
    ];
    let ctx = || {
        let ctx = Context::new();
        ctx.set("items", Value::Context(Context::from_values([1, 2, 3].map(Value::int))));
        ctx
    };
    for source in templates {
        let engine = Engine::new();
        let program = engine.parse_template(source).unwrap();
        let again = Engine::new().parse_template(&program.to_string()).unwrap();
        let (mut first, mut second) = (String::new(), String::new());
        engine.evaluate_to(&program, &mut first, &ctx()).unwrap();
        Engine::new().evaluate_to(&again, &mut second, &ctx()).unwrap();
        assert_eq!(second, first, "rendering was `{}`", again);
    }
}
