mod common;

use common::{run, run_with};
use pretty_assertions::assert_eq;
use quill::{Context, Engine, Value};

fn strings(value: &Value) -> Vec<String> {
    value
        .as_context()
        .map(|c| c.values().iter().map(Value::render).collect())
        .unwrap_or_default()
}

#[test]
fn test_base_fields_initialize_before_derived_and_constructor() {
    let source = r#"
        Static.log = [];
        class A { a = Static.log.push("A field"); }
        class B : A {
            b = Static.log.push("B field");
            B() { Static.log.push("B constructor"); }
        }
        new B();
        Static.log;
    "#;
    assert_eq!(strings(&run(source)), vec!["A field", "B field", "B constructor"]);
}

#[test]
fn test_three_level_chain_order() {
    let source = r#"
        Static.order = "";
        class Root { r = Static.order += "r"; }
        class Mid : Root { m = Static.order += "m"; }
        class Leaf : Mid { l = Static.order += "l"; Leaf() { Static.order += "!"; } }
        new Leaf();
        Static.order;
    "#;
    assert_eq!(run(source), Value::from("rml!"));
}

#[test]
fn test_constructor_binds_this_and_arguments() {
    let source = r#"
        class Point {
            x = 0; y = 0;
            Point(x, y) { this.x = x; this.y = y; }
            sum() { return x + y; }
        }
        p = new Point(3, 4);
        [p.x, p.y, p.sum()];
    "#;
    assert_eq!(strings(&run(source)), vec!["3", "4", "7"]);
}

#[test]
fn test_bare_names_in_methods_reach_fields() {
    let source = r#"
        class Counter {
            count = 0;
            bump() { count += 1; return count; }
        }
        c = new Counter();
        c.bump(); c.bump();
        c.count;
    "#;
    assert_eq!(run(source), Value::int(2));
}

#[test]
fn test_most_derived_method_wins() {
    let source = r#"
        class Animal {
            speak() { return "..."; }
            describe() { return "I say " + this.speak(); }
        }
        class Dog : Animal { speak() { return "woof"; } }
        [new Animal().describe(), new Dog().describe()];
    "#;
    assert_eq!(strings(&run(source)), vec!["I say ...", "I say woof"]);
}

#[test]
fn test_base_constructor_runs_when_derived_has_none() {
    let source = r#"
        class Named { Named(n) { this.name = n; } }
        class Pet : Named { }
        new Pet("Rex").name;
    "#;
    assert_eq!(run(source), Value::from("Rex"));
}

#[test]
fn test_static_methods() {
    let source = r#"
        class Temperature {
            static function fromF(f) { return (f - 32) * 5 / 9; }
        }
        Temperature.fromF(212);
    "#;
    assert_eq!(run(source), Value::int(100));
}

#[test]
fn test_class_called_like_a_function_instantiates() {
    let source = r#"
        class Pair { Pair(a, b) { this.a = a; this.b = b; } }
        p = Pair(1, 2);
        p.a + p.b;
    "#;
    assert_eq!(run(source), Value::int(3));
}

#[test]
fn test_dotted_class_names() {
    let source = r#"
        class Shapes.Circle { r = 1; area() { return 3 * r * r; } }
        c = new Shapes.Circle();
        c.r = 2;
        c.area();
    "#;
    assert_eq!(run(source), Value::int(12));
}

#[test]
fn test_methods_passed_as_values_stay_bound() {
    let source = r#"
        class Greeter {
            greeting = "hello";
            greet(name) { return greeting + " " + name; }
        }
        function call_with(f, arg) { return f(arg); }
        g = new Greeter();
        call_with(g.greet, "Ada");
    "#;
    assert_eq!(run(source), Value::from("hello Ada"));
}

#[test]
fn test_instances_are_shared_by_reference() {
    let ctx = Context::new();
    run_with("class Cell { v = 1; } a = new Cell(); b = a; b.v = 5;", &ctx);
    let a = ctx.get("a").unwrap();
    match a {
        Value::Instance(instance) => assert_eq!(instance.fields.get("v"), Some(Value::int(5))),
        other => panic!("expected an instance, got {:?}", other),
    }
}

#[test]
fn test_unknown_class_yields_nothing() {
    assert_eq!(run("new Missing(1);"), Value::Null);
}

#[test]
fn test_classes_outlive_the_declaring_program() {
    let engine = Engine::new();
    let ctx = Context::new();
    engine.run("class Unit { v = 1; }", &ctx).unwrap();
    assert_eq!(engine.run("new Unit().v;", &ctx).unwrap(), Value::int(1));
}
