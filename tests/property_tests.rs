use proptest::prelude::*;
use quill::{Context, Engine, Value};

fn token_soup() -> impl Strategy<Value = String> {
    let token = prop::sample::select(vec![
        "x", "y", "f", "1", "2.5", "\"s\"", "+", "-", "*", "==", "=", "!", "(", ")", "{", "}", "[", "]", ",",
        ";", "if", "else", "while",
    ]);
    prop::collection::vec(token, 0..24).prop_map(|tokens| tokens.join(" "))
}

proptest! {
    #[test]
    fn parse_never_panics(source in ".{0,64}") {
        let _ = Engine::new().parse(&source);
        let _ = Engine::new().parse_template(&source);
    }

    #[test]
    fn parsing_is_deterministic(source in token_soup()) {
        let first = Engine::new().parse(&source).map(|p| p.to_string()).map_err(|e| (e.code(), e.span()));
        let second = Engine::new().parse(&source).map(|p| p.to_string()).map_err(|e| (e.code(), e.span()));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rendering_reaches_a_fixed_point(source in token_soup()) {
        if let Ok(program) = Engine::new().parse(&source) {
            let once = program.to_string();
            let reparsed = Engine::new().parse(&once);
            prop_assert!(reparsed.is_ok(), "`{}` rendered as `{}` which does not parse", source, once);
            if let Ok(reparsed) = reparsed {
                prop_assert_eq!(reparsed.to_string(), once);
            }
        }
    }

    #[test]
    fn integer_arithmetic_matches(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
        let source = format!("{} + {} * {} - ({} - {});", a, b, c, b, a);
        let value = Engine::new().run(&source, &Context::new()).unwrap();
        prop_assert_eq!(value, Value::int(a + b * c - (b - a)));
    }

    #[test]
    fn division_matches_floats(a in -1000i64..1000, b in 1i64..50) {
        let value = Engine::new().run(&format!("{} / {};", a, b), &Context::new()).unwrap();
        prop_assert_eq!(value.as_number(), Some(a as f64 / b as f64));
    }

    #[test]
    fn strings_survive_quoting(text in "[ -~]{0,24}") {
        let ctx = Context::new();
        ctx.set("text", Value::from(text.as_str()));
        let quoted = Engine::new().parse("text;").unwrap();
        prop_assert_eq!(Engine::new().evaluate(&quoted, &ctx).unwrap(), Value::from(text.as_str()));

        let literal = format!("\"{}\";", quill::format::escape_json_string(&text));
        let value = Engine::new().run(&literal, &Context::new()).unwrap();
        prop_assert_eq!(value, Value::from(text.as_str()));
    }
}
